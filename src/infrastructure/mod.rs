//! 基础设施层：持有浏览器页面，只暴露页面原语

pub mod chrome_page;
pub mod network_idle;
pub mod page_driver;

pub use chrome_page::ChromePage;
pub use page_driver::{ElementHandle, PageDriver, SessionCookie};
