//! Git operations module - command gateway, typed CLI wrapper and worktree bindings.
//!
//! All git access goes through a [`GitGateway`] handed to each component:
//! - [`SystemGit`] shells out to the real binary
//! - [`MockGit`] replays scripted output for unit tests

mod cli;
mod gateway;
mod worktree;

pub use cli::{GitCli, WorktreeEntry};
pub use gateway::{GitError, GitGateway, MockGit, SystemGit};
pub use worktree::{
    find_worktree_for_branch, read_base_branch, record_base_branch, WorktreeError,
    BASE_BRANCH_FILE,
};
