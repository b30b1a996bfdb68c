mod read;
mod types;
mod write;

const POST_COLUMNS: &str = "id, document, created_at, updated_at";
