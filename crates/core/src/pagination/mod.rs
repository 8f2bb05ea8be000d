//! Paging state and resume tokens for queries and scans.

mod pager;
mod token;

pub use pager::PageCollector;
pub use token::{decode_resume_token, encode_resume_token, InvalidResumeToken};
