use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use uuid::Uuid;
use validator::Validate;

/// Tags and categories share one shape and differ only in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Taxonomy {
    Tag,
    Category,
}

impl Taxonomy {
    pub fn table(self) -> &'static str {
        match self {
            Taxonomy::Tag => "tags",
            Taxonomy::Category => "categories",
        }
    }

    pub fn link_table(self) -> &'static str {
        match self {
            Taxonomy::Tag => "post_tags",
            Taxonomy::Category => "post_categories",
        }
    }

    pub fn link_column(self) -> &'static str {
        match self {
            Taxonomy::Tag => "tag_id",
            Taxonomy::Category => "category_id",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Taxonomy::Tag => "Tag",
            Taxonomy::Category => "Category",
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Term {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewTerm {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Validate, JsonSchema)]
pub struct TermRequest {
    #[validate(length(min = 1, max = 50, message = "Name must be between 1 and 50 characters"))]
    pub name: String,
    #[validate(length(max = 300, message = "Description must be less than 300 characters"))]
    pub description: Option<String>,
}

#[derive(Serialize, Debug, Clone, JsonSchema)]
pub struct TermResponse {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
}

impl From<&Term> for TermResponse {
    fn from(term: &Term) -> Self {
        Self {
            id: term.id,
            name: term.name.clone(),
            slug: term.slug.clone(),
            description: term.description.clone(),
        }
    }
}
