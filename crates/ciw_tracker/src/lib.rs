pub mod assignee;
pub mod body;
pub mod reconcile;
pub mod retry;
pub mod tracker;
