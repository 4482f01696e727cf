//! Collection allow-list and the per-collection field schema used by the
//! query forwarder.
//!
//! The schema is data: which fields hold identifiers (and are therefore
//! coerced to `ObjectId` when they carry a 24-hex string), which fields are
//! boolean flags (normalized from legacy `"0"`/`"1"` encodings on ingestion),
//! and which text fields the `search` operation matches against.

use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionName {
    Questions,
    Answers,
    Categories,
    Tests,
    Resources,
    TestResults,
    Pages,
    Menus,
    ExamConfigurations,
    ExamConfigurationItems,
    Roles,
}

#[derive(Debug)]
pub struct CollectionSchema {
    pub id_fields: &'static [&'static str],
    pub flag_fields: &'static [&'static str],
    pub search_fields: &'static [&'static str],
}

impl CollectionSchema {
    pub fn is_id_field(&self, field: &str) -> bool {
        self.id_fields.contains(&field)
    }

    pub fn is_flag_field(&self, field: &str) -> bool {
        self.flag_fields.contains(&field)
    }
}

const DEFAULT_SEARCH_FIELDS: &[&str] = &["question", "name"];

const QUESTIONS: CollectionSchema = CollectionSchema {
    id_fields: &["_id", "category_id"],
    flag_fields: &["is_active"],
    search_fields: &["question", "question_text", "question_text_hy", "name"],
};

const ANSWERS: CollectionSchema = CollectionSchema {
    id_fields: &["_id", "question_id"],
    flag_fields: &["is_correct", "is_right"],
    search_fields: &["answer", "answer_text", "answer_text_hy"],
};

const CATEGORIES: CollectionSchema = CollectionSchema {
    id_fields: &["_id"],
    flag_fields: &["is_active"],
    search_fields: &["name", "name_hy", "title"],
};

const TESTS: CollectionSchema = CollectionSchema {
    id_fields: &["_id", "category_id"],
    flag_fields: &["is_active"],
    search_fields: &["name", "name_hy"],
};

const RESOURCES: CollectionSchema = CollectionSchema {
    id_fields: &["_id", "category_id"],
    flag_fields: &["is_active"],
    search_fields: &["title", "title_hy"],
};

const TEST_RESULTS: CollectionSchema = CollectionSchema {
    id_fields: &["_id", "test_id", "category_id", "exam_config_id"],
    flag_fields: &["passed"],
    search_fields: DEFAULT_SEARCH_FIELDS,
};

const PAGES: CollectionSchema = CollectionSchema {
    id_fields: &["_id"],
    flag_fields: &["is_published"],
    search_fields: &["title", "title_hy", "slug"],
};

const MENUS: CollectionSchema = CollectionSchema {
    id_fields: &["_id", "parent_id"],
    flag_fields: &["is_active"],
    search_fields: &["title", "title_hy"],
};

const EXAM_CONFIGURATIONS: CollectionSchema = CollectionSchema {
    id_fields: &["_id"],
    flag_fields: &["is_active"],
    search_fields: DEFAULT_SEARCH_FIELDS,
};

const EXAM_CONFIGURATION_ITEMS: CollectionSchema = CollectionSchema {
    id_fields: &["_id", "exam_config_id", "category_id"],
    flag_fields: &[],
    search_fields: DEFAULT_SEARCH_FIELDS,
};

const ROLES: CollectionSchema = CollectionSchema {
    id_fields: &["_id"],
    flag_fields: &[],
    search_fields: DEFAULT_SEARCH_FIELDS,
};

impl CollectionName {
    pub const ALL: [CollectionName; 11] = [
        CollectionName::Questions,
        CollectionName::Answers,
        CollectionName::Categories,
        CollectionName::Tests,
        CollectionName::Resources,
        CollectionName::TestResults,
        CollectionName::Pages,
        CollectionName::Menus,
        CollectionName::ExamConfigurations,
        CollectionName::ExamConfigurationItems,
        CollectionName::Roles,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionName::Questions => "questions",
            CollectionName::Answers => "answers",
            CollectionName::Categories => "questions_categories",
            CollectionName::Tests => "tests",
            CollectionName::Resources => "resources",
            CollectionName::TestResults => "test_results",
            CollectionName::Pages => "pages",
            CollectionName::Menus => "menus",
            CollectionName::ExamConfigurations => "exam_configurations",
            CollectionName::ExamConfigurationItems => "exam_configuration_items",
            CollectionName::Roles => "roles",
        }
    }

    pub fn schema(&self) -> &'static CollectionSchema {
        match self {
            CollectionName::Questions => &QUESTIONS,
            CollectionName::Answers => &ANSWERS,
            CollectionName::Categories => &CATEGORIES,
            CollectionName::Tests => &TESTS,
            CollectionName::Resources => &RESOURCES,
            CollectionName::TestResults => &TEST_RESULTS,
            CollectionName::Pages => &PAGES,
            CollectionName::Menus => &MENUS,
            CollectionName::ExamConfigurations => &EXAM_CONFIGURATIONS,
            CollectionName::ExamConfigurationItems => &EXAM_CONFIGURATION_ITEMS,
            CollectionName::Roles => &ROLES,
        }
    }
}

impl FromStr for CollectionName {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        CollectionName::ALL
            .into_iter()
            .find(|name| name.as_str() == value)
            .ok_or_else(|| format!("Invalid collection: {}", value))
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
