pub mod click;
pub mod fallback;
pub mod health;
pub mod pages;
