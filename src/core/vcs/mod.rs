pub mod system_git;
mod system_git_ops;

pub use system_git::SystemGit;

/// Information about a commit
#[derive(Debug, Clone)]
pub struct CommitInfo {
  pub sha: String,
  pub committer_email: String,
  pub message: String,
  pub parent_shas: Vec<String>,
}

/// Name/email pair a commit is recorded under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
  pub name: String,
  pub email: String,
}

impl Signature {
  pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      email: email.into(),
    }
  }
}
