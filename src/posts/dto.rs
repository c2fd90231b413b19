use serde::{Deserialize, Serialize};

use crate::posts::repo_types::{AuthorSummary, Post, PostWithAuthor};

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePostRequest {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct PostEnvelope {
    pub post: Option<Post>,
}

#[derive(Debug, Serialize)]
pub struct PostsEnvelope {
    pub posts: Vec<PostWithAuthor>,
}

#[derive(Debug, Serialize)]
pub struct AuthorPostsEnvelope {
    pub posts: Vec<Post>,
    pub user: Option<AuthorSummary>,
}

#[derive(Debug, Serialize)]
pub struct AuthorsEnvelope {
    pub authors: Vec<AuthorSummary>,
}

/// Matches the original contract: POST /post answers `{"post": "created"}`.
#[derive(Debug, Serialize)]
pub struct CreatedEnvelope {
    pub post: &'static str,
}
