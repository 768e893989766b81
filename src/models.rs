pub mod approval;
pub mod project;
pub mod role;
pub mod work_item;
