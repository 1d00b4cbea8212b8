// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The in-container relay daemon, embedded as a build-time asset (spec
//! §4.4, SPEC_FULL §4.4: "the in-container daemon script is represented in
//! this workspace as a static asset... deployed by the container driver on
//! first task start").

/// Source of the relay daemon deployed into each task's container.
pub const RELAY_DAEMON_SOURCE: &str = include_str!("../assets/relay_daemon.py");

/// Path the container driver writes [`RELAY_DAEMON_SOURCE`] to inside the
/// container before starting it.
pub const RELAY_DAEMON_CONTAINER_PATH: &str = "/usr/local/bin/caic-relay-daemon.py";

/// Default control-socket path the daemon listens on inside the container.
pub const RELAY_SOCKET_CONTAINER_PATH: &str = "/tmp/caic-relay.sock";

/// Default output log path the daemon appends agent stdout to.
pub const RELAY_OUTPUT_CONTAINER_PATH: &str = "/tmp/output.jsonl";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_asset_is_nonempty_python() {
        assert!(RELAY_DAEMON_SOURCE.contains("asyncio"));
        assert!(RELAY_DAEMON_SOURCE.contains("serve-attach"));
    }
}
