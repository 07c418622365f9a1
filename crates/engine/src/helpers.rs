// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Child-task bookkeeping shared by the locker and the façades

use tokio::task::JoinHandle;

pub(crate) fn locker_task_name(lock_name: &str) -> String {
    format!("{lock_name}/locker")
}

pub(crate) fn watchdog_task_name(lock_name: &str) -> String {
    format!("{lock_name}/watchdog")
}

pub(crate) fn payload_task_name(lock_name: &str) -> String {
    format!("{lock_name}/payload")
}

/// Join a fire-and-forget child, logging panics instead of propagating.
pub(crate) async fn join_quietly(task: JoinHandle<()>, task_name: &str) {
    if let Err(error) = task.await {
        if error.is_panic() {
            tracing::error!(task = %task_name, %error, "child task panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_names_carry_the_lock_name() {
        assert_eq!(locker_task_name("orders"), "orders/locker");
        assert_eq!(watchdog_task_name("orders"), "orders/watchdog");
        assert_eq!(payload_task_name("orders"), "orders/payload");
    }

    #[tokio::test]
    async fn join_quietly_swallows_panics() {
        let task = tokio::spawn(async { panic!("child gone") });
        join_quietly(task, "test/child").await;
    }

    #[tokio::test]
    async fn join_quietly_passes_clean_exits() {
        let task = tokio::spawn(async {});
        join_quietly(task, "test/child").await;
    }
}
