use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::application::error::{AppError, RepoResultExt};
use crate::application::pagination::{Page, PageRequest};
use crate::application::repos::{CreateUserParams, UpdateUserParams, UserQuery, UsersRepo};
use crate::cache::{CacheStore, InvalidationCoordinator, Mutation, keys, read_through};
use crate::domain::entities::UserRecord;
use crate::domain::error::ensure_non_empty;
use crate::domain::types::UserRole;
use crate::domain::users::{PersonName, normalize_email};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserListParams {
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserCommand {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserCommand {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Clone)]
pub struct AdminUserService {
    users: Arc<dyn UsersRepo>,
    invalidator: Arc<InvalidationCoordinator>,
    cache: Option<Arc<CacheStore>>,
}

impl AdminUserService {
    pub fn new(users: Arc<dyn UsersRepo>, invalidator: Arc<InvalidationCoordinator>) -> Self {
        Self {
            users,
            invalidator,
            cache: None,
        }
    }

    pub fn with_cache_opt(mut self, cache: Option<Arc<CacheStore>>) -> Self {
        self.cache = cache;
        self
    }

    #[instrument(skip(self))]
    pub async fn list(&self, params: &UserListParams) -> Result<Page<UserRecord>, AppError> {
        let search = params
            .search
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        let page = PageRequest::from_raw(params.page, params.limit)?;
        let key = keys::admin_users_list(
            search.as_deref(),
            Some(i64::from(page.page)),
            Some(i64::from(page.limit)),
        );
        let query = UserQuery { search, page };

        read_through(self.cache.as_deref(), &key, || async {
            let joined = tokio::try_join!(
                self.users.list_users(&query),
                self.users.count_users(query.search.as_deref())
            );
            let (items, total) = joined.entity("user")?;
            Ok(Page::new(items, total, page))
        })
        .await
    }

    #[instrument(skip(self, command))]
    pub async fn create(&self, command: CreateUserCommand) -> Result<UserRecord, AppError> {
        let name = PersonName::new(&command.first_name, &command.last_name)?;
        let email = normalize_email(&command.email)?;
        let role = match command.role.as_deref() {
            None => UserRole::Reader,
            Some(raw) => UserRole::parse(raw)
                .ok_or_else(|| AppError::validation(format!("unknown role `{raw}`")))?,
        };

        let user = self
            .users
            .create_user(CreateUserParams {
                first_name: name.first_name,
                last_name: name.last_name,
                email,
                role,
            })
            .await
            .entity("user")?;

        self.invalidator
            .invalidate(&Mutation::UserCreated { user_id: user.id });
        Ok(user)
    }

    #[instrument(skip(self, command))]
    pub async fn update(&self, id: Uuid, command: UpdateUserCommand) -> Result<UserRecord, AppError> {
        if command.first_name.is_none() && command.last_name.is_none() {
            return Err(AppError::validation("update must change at least one field"));
        }
        for (value, field) in [
            (command.first_name.as_deref(), "first_name"),
            (command.last_name.as_deref(), "last_name"),
        ] {
            if let Some(value) = value {
                ensure_non_empty(value, field)?;
            }
        }

        let user = self
            .users
            .update_user(UpdateUserParams {
                id,
                first_name: command.first_name.map(|value| value.trim().to_string()),
                last_name: command.last_name.map(|value| value.trim().to_string()),
            })
            .await
            .entity("user")?;

        self.invalidator
            .invalidate(&Mutation::UserUpdated { user_id: id });
        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<UserRecord, AppError> {
        let deleted = self.users.delete_user(id).await.entity("user")?;
        self.invalidator.invalidate(&Mutation::UserDeleted {
            user_id: id,
            touched_posts: deleted.touched_posts,
        });
        Ok(deleted.user)
    }
}
