use crate::Comment;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    Newest,
    Oldest,
    MostLiked,
    MostDisliked,
}

impl SortBy {
    /// Value for the `sortBy` query parameter
    pub fn as_query(&self) -> &'static str {
        match self {
            SortBy::Newest => "newest",
            SortBy::Oldest => "oldest",
            SortBy::MostLiked => "most_liked",
            SortBy::MostDisliked => "most_disliked",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    /// Total number of items across all pages
    pub total: u64,
    pub pages: u32,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct CommentPage {
    pub comments: Vec<Comment>,
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_by_wire_names() {
        for (sort, name) in [
            (SortBy::Newest, "newest"),
            (SortBy::Oldest, "oldest"),
            (SortBy::MostLiked, "most_liked"),
            (SortBy::MostDisliked, "most_disliked"),
        ] {
            assert_eq!(sort.as_query(), name);
            assert_eq!(
                serde_json::to_string(&sort).unwrap(),
                format!("\"{name}\"")
            );
            assert_eq!(
                serde_json::from_str::<SortBy>(&format!("\"{name}\"")).unwrap(),
                sort
            );
        }
    }
}
