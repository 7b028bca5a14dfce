pub mod apply;
pub mod backups;
pub mod destroy;
pub mod inventory;
