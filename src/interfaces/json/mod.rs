pub mod document_reader;
