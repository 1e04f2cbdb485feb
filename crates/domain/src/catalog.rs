//! The bookstore catalog.

use serde::{Deserialize, Serialize};

/// A book as shown in the suggestions list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub book_id: u32,
    pub title: String,
    pub author: String,
}

impl Book {
    pub fn new(book_id: u32, title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            book_id,
            title: title.into(),
            author: author.into(),
        }
    }
}

/// A stock-keeping document held by the document store cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookDocument {
    pub title: String,
    pub author: String,
    pub description: String,
    pub price: f64,
    pub stock: u32,
}

/// Books that can be offered as suggestions.
pub fn suggestion_catalog() -> Vec<Book> {
    vec![
        Book::new(123, "Big Finnish Fish", "Joosep Tavits"),
        Book::new(234, "Beekeeping 1.0", "Bernard Szeliga"),
        Book::new(345, "Beekeeping 2.0", "Bernard Szeliga"),
        Book::new(456, "Moomin", "Tove Jansson"),
        Book::new(567, "Learning Python", "John Smith"),
        Book::new(678, "JavaScript - The Good Parts", "Jane Doe"),
        Book::new(
            789,
            "Domain-Driven Design: Tackling Complexity in the Heart of Software",
            "Eric Evans",
        ),
    ]
}

/// Initial contents of the document store.
pub fn seed_documents() -> Vec<BookDocument> {
    vec![
        BookDocument {
            title: "Learning Python".into(),
            author: "John Smith".into(),
            description: "An in-depth guide to Python programming.".into(),
            price: 3.00,
            stock: 7,
        },
        BookDocument {
            title: "JavaScript - The Good Parts".into(),
            author: "Jane Doe".into(),
            description: "Unearthing the excellence in JavaScript.".into(),
            price: 3.00,
            stock: 15,
        },
        BookDocument {
            title: "Domain-Driven Design: Tackling Complexity in the Heart of Software".into(),
            author: "Eric Evans".into(),
            description: "A technical guide to keeping large code bases manageable.".into(),
            price: 3.00,
            stock: 15,
        },
        BookDocument {
            title: "Design Patterns: Elements of Reusable Object-Oriented Software".into(),
            author: "Erich Gamma, Richard Helm, Ralph Johnson, & John Vlissides".into(),
            description: "Seminal book on Design Patterns.".into(),
            price: 3.00,
            stock: 15,
        },
    ]
}
