mod client;
mod models;

pub use client::{CommitPage, DEFAULT_API_BASE_URL, FILTERED_PAGE_SIZE, HostingClient, UNFILTERED_PAGE_SIZE};
pub use models::{Commit, Contributor, TreeEntry};
