use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
    Json, Router,
};
use tracing::{error, instrument};
use uuid::Uuid;

use crate::{
    auth::dto::Outcome,
    posts::{
        dto::{
            AuthorPostsEnvelope, AuthorsEnvelope, CreatePostRequest, CreatedEnvelope,
            PostEnvelope, PostsEnvelope, UpdatePostRequest,
        },
        repo_types::{AuthorSummary, Post},
    },
    sessions::CurrentUser,
    state::AppState,
};

pub fn read_router() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_posts))
        .route("/post/:id", get(get_post))
        .route("/author/:auth_id", get(get_author))
        .route("/authors", get(list_authors))
}

pub fn write_router() -> Router<AppState> {
    Router::new()
        .route("/post", post(create_post))
        .route("/post/:id", patch(update_post))
        .route("/post/:id", delete(delete_post))
}

/// Store failures on this pass-through surface degrade to the same
/// body-level error contract as the auth endpoints.
fn store_error<E: std::fmt::Display>(e: E) -> Response {
    error!(error = %e, "post store operation failed");
    Json(Outcome::error("something went wrong, please try again")).into_response()
}

#[instrument(skip(state))]
pub async fn list_posts(State(state): State<AppState>) -> Response {
    match Post::list_newest_first(&state.db).await {
        Ok(posts) => Json(PostsEnvelope { posts }).into_response(),
        Err(e) => store_error(e),
    }
}

#[instrument(skip(state))]
pub async fn get_post(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match Post::find_by_id(&state.db, id).await {
        Ok(post) => Json(PostEnvelope { post }).into_response(),
        Err(e) => store_error(e),
    }
}

#[instrument(skip(state))]
pub async fn get_author(State(state): State<AppState>, Path(auth_id): Path<Uuid>) -> Response {
    let posts = match Post::list_by_author(&state.db, auth_id).await {
        Ok(posts) => posts,
        Err(e) => return store_error(e),
    };
    match AuthorSummary::find(&state.db, auth_id).await {
        Ok(user) => Json(AuthorPostsEnvelope { posts, user }).into_response(),
        Err(e) => store_error(e),
    }
}

#[instrument(skip(state))]
pub async fn list_authors(State(state): State<AppState>) -> Response {
    match AuthorSummary::list(&state.db).await {
        Ok(authors) => Json(AuthorsEnvelope { authors }).into_response(),
        Err(e) => store_error(e),
    }
}

#[instrument(skip(state, payload))]
pub async fn create_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<CreatePostRequest>,
) -> Response {
    match Post::create(&state.db, &payload.title, &payload.content, user.id).await {
        Ok(post) => {
            tracing::info!(post_id = %post.id, author_id = %user.id, "post created");
            Json(CreatedEnvelope { post: "created" }).into_response()
        }
        Err(e) => store_error(e),
    }
}

#[instrument(skip(state, payload))]
pub async fn update_post(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePostRequest>,
) -> Response {
    match Post::update(&state.db, id, &payload.title, &payload.content).await {
        Ok(true) => Json(Outcome::success("It's been edited")).into_response(),
        Ok(false) => Json(Outcome::error("post not found")).into_response(),
        Err(e) => store_error(e),
    }
}

#[instrument(skip(state))]
pub async fn delete_post(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Response {
    match Post::delete(&state.db, id).await {
        Ok(()) => Json(Outcome::success("That post is GONE")).into_response(),
        Err(e) => store_error(e),
    }
}
