//! Workspace root. The Wringer crates live under `crates/`.
