use serde_json::{Map, Value};
use sqlx::types::Json;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::domain::posts::PostDocument;

#[derive(sqlx::FromRow)]
pub(crate) struct PostRow {
    pub(crate) id: i64,
    pub(crate) document: Json<Map<String, Value>>,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) updated_at: OffsetDateTime,
}

impl From<PostRow> for PostDocument {
    /// The stored body with the row-owned fields laid over it.
    fn from(row: PostRow) -> Self {
        let mut fields = row.document.0;
        fields.insert("id".to_string(), Value::from(row.id));
        for (name, at) in [("createdAt", row.created_at), ("updatedAt", row.updated_at)] {
            if let Ok(rendered) = at.format(&Rfc3339) {
                fields.insert(name.to_string(), Value::String(rendered));
            }
        }
        PostDocument::new(fields)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::macros::datetime;

    use super::*;
    use crate::domain::posts::PostId;

    #[test]
    fn row_fields_override_stored_body() {
        let body = json!({"id": 99, "title": "Hello", "createdAt": "1999-01-01"});
        let Value::Object(body) = body else {
            unreachable!("literal object");
        };
        let row = PostRow {
            id: 7,
            document: Json(body),
            created_at: datetime!(2024-01-02 03:04:05 UTC),
            updated_at: datetime!(2024-01-03 00:00:00 UTC),
        };

        let document = PostDocument::from(row);

        assert_eq!(document.id(), Some(PostId::new(7)));
        assert_eq!(document.created_at(), Some("2024-01-02T03:04:05Z"));
        assert_eq!(document.str_field("updatedAt"), Some("2024-01-03T00:00:00Z"));
        assert_eq!(document.str_field("title"), Some("Hello"));
    }
}
