pub mod document_writer;
pub mod grid;
pub mod page_geometry;
pub mod page_layout;
