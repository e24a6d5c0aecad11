pub mod kobo;
