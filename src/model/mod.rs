pub mod candidate;
pub mod comment;
pub mod tracked;
