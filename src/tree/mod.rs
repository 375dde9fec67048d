pub mod boundingbox;
pub mod cut;
pub mod nodestore;
pub mod nodeview;
pub mod randomcuttree;
