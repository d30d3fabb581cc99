pub mod history;
pub mod indicator;
pub mod pick;
pub mod statement;
pub mod strategy;
pub mod ticker;
