pub mod membership;
pub mod reorder;
