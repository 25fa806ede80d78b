//! Book model representing a single search result from any provider.

use serde::{Deserialize, Serialize};

/// The provider a book record was found in
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    OpenLibrary,
    Kakao,
    #[serde(untagged)]
    Other(String),
}

impl Provider {
    /// Returns the display name of the provider
    pub fn name(&self) -> &str {
        match self {
            Provider::OpenLibrary => "Open Library",
            Provider::Kakao => "Kakao Book",
            Provider::Other(s) => s,
        }
    }

    /// Returns the provider identifier (matches the source id)
    pub fn id(&self) -> &str {
        match self {
            Provider::OpenLibrary => "openlibrary",
            Provider::Kakao => "kakao",
            Provider::Other(s) => s,
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A book returned by a search
///
/// Records are immutable once a source has produced them. The results list
/// only ever reads them; selection hands a clone to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    /// Provider-specific identifier (ISBN when known, otherwise the provider key)
    pub id: String,

    /// Book title
    pub title: String,

    /// Author names in credit order
    #[serde(default)]
    pub authors: Vec<String>,

    /// Cover image URL
    pub cover_url: Option<String>,

    /// Publisher name
    pub publisher: Option<String>,

    /// Publication date (ISO format, or just a year)
    pub published: Option<String>,

    /// Short description or blurb
    pub description: Option<String>,

    /// Provider page for this book
    pub url: Option<String>,

    /// Where the record came from
    pub provider: Provider,
}

impl BookRecord {
    /// Create a new record with the required fields
    pub fn new(id: impl Into<String>, title: impl Into<String>, provider: Provider) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            authors: Vec::new(),
            cover_url: None,
            publisher: None,
            published: None,
            description: None,
            url: None,
            provider,
        }
    }

    /// Authors joined for display, e.g. "Frank Herbert, Brian Herbert"
    pub fn author_line(&self) -> String {
        self.authors.join(", ")
    }

    /// The four-digit publication year, if the date carries one
    pub fn year(&self) -> Option<&str> {
        let published = self.published.as_deref()?;
        let year = published.get(..4)?;
        year.chars().all(|c| c.is_ascii_digit()).then_some(year)
    }

    pub fn has_cover(&self) -> bool {
        self.cover_url.is_some()
    }
}

/// Builder for constructing BookRecord objects
#[derive(Debug, Clone)]
pub struct BookBuilder {
    book: BookRecord,
}

impl BookBuilder {
    /// Create a new builder with required fields
    pub fn new(id: impl Into<String>, title: impl Into<String>, provider: Provider) -> Self {
        Self {
            book: BookRecord::new(id, title, provider),
        }
    }

    /// Append an author, skipping blanks
    pub fn author(mut self, author: impl Into<String>) -> Self {
        let author = author.into();
        let trimmed = author.trim();
        if !trimmed.is_empty() {
            self.book.authors.push(trimmed.to_string());
        }
        self
    }

    /// Append several authors
    pub fn authors<I, S>(self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        authors.into_iter().fold(self, |b, a| b.author(a))
    }

    pub fn cover_url(mut self, url: impl Into<String>) -> Self {
        self.book.cover_url = Some(url.into());
        self
    }

    pub fn publisher(mut self, publisher: impl Into<String>) -> Self {
        self.book.publisher = Some(publisher.into());
        self
    }

    pub fn published(mut self, date: impl Into<String>) -> Self {
        self.book.published = Some(date.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.book.description = Some(description.into());
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.book.url = Some(url.into());
        self
    }

    /// Build the BookRecord
    pub fn build(self) -> BookRecord {
        self.book
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_book_builder() {
        let book = BookBuilder::new("9780441013593", "Dune", Provider::OpenLibrary)
            .author("Frank Herbert")
            .author("  ")
            .publisher("Ace")
            .published("1965-08-01")
            .cover_url("https://covers.openlibrary.org/b/id/1-M.jpg")
            .build();

        assert_eq!(book.id, "9780441013593");
        assert_eq!(book.title, "Dune");
        assert_eq!(book.authors, vec!["Frank Herbert"]);
        assert_eq!(book.publisher.as_deref(), Some("Ace"));
        assert!(book.has_cover());
    }

    #[test]
    fn test_author_line() {
        let book = BookBuilder::new("1", "Good Omens", Provider::OpenLibrary)
            .authors(["Terry Pratchett", "Neil Gaiman"])
            .build();

        assert_eq!(book.author_line(), "Terry Pratchett, Neil Gaiman");
    }

    #[test]
    fn test_year() {
        let dated = BookBuilder::new("1", "Dune", Provider::Kakao)
            .published("1965-08-01T00:00:00.000+09:00")
            .build();
        assert_eq!(dated.year(), Some("1965"));

        let bare = BookBuilder::new("2", "Dune", Provider::OpenLibrary)
            .published("1965")
            .build();
        assert_eq!(bare.year(), Some("1965"));

        let garbled = BookBuilder::new("3", "Dune", Provider::OpenLibrary)
            .published("n.d.")
            .build();
        assert_eq!(garbled.year(), None);

        let missing = BookRecord::new("4", "Dune", Provider::OpenLibrary);
        assert_eq!(missing.year(), None);
    }

    #[test]
    fn test_provider_serde() {
        let json = serde_json::to_string(&Provider::OpenLibrary).unwrap();
        assert_eq!(json, "\"open_library\"");

        let other: Provider = serde_json::from_str("\"local\"").unwrap();
        assert_eq!(other, Provider::Other("local".to_string()));
    }
}
