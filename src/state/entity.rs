//! Normalized entity records and the keys used to address them.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

static NULL: Value = Value::Null;

/// Kinds of records the client keeps in its normalized store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A game from the catalogue.
    Game,
    /// A user review (ratings are reviews without text).
    Review,
    /// A comment attached to a game, review, post or collection.
    Comment,
    /// A user feed post.
    Post,
    /// A user-curated collection of games.
    Collection,
    /// A site member.
    User,
}

impl EntityKind {
    /// Singular name used in logs and list keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Game => "game",
            EntityKind::Review => "review",
            EntityKind::Comment => "comment",
            EntityKind::Post => "post",
            EntityKind::Collection => "collection",
            EntityKind::User => "user",
        }
    }

    /// Plural path segment the REST API uses for this kind.
    pub fn path_segment(&self) -> &'static str {
        match self {
            EntityKind::Game => "games",
            EntityKind::Review => "reviews",
            EntityKind::Comment => "comments",
            EntityKind::Post => "posts",
            EntityKind::Collection => "collections",
            EntityKind::User => "users",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable identifier of an entity: numeric primary key or string slug.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    /// Numeric primary key.
    Num(u64),
    /// String identifier (slug or opaque key).
    Slug(String),
}

impl EntityId {
    /// Extract an identifier from a JSON `id` value.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => number.as_u64().map(EntityId::Num),
            Value::String(slug) if !slug.is_empty() => Some(EntityId::Slug(slug.clone())),
            _ => None,
        }
    }

    /// JSON representation used in request bodies.
    pub fn to_value(&self) -> Value {
        match self {
            EntityId::Num(id) => Value::from(*id),
            EntityId::Slug(slug) => Value::from(slug.as_str()),
        }
    }
}

impl From<u64> for EntityId {
    fn from(value: u64) -> Self {
        EntityId::Num(value)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        EntityId::Slug(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        EntityId::Slug(value)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Num(id) => write!(f, "{id}"),
            EntityId::Slug(slug) => f.write_str(slug),
        }
    }
}

/// Fully qualified reference to an entity in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    /// Kind of the entity.
    pub kind: EntityKind,
    /// Identifier within its kind.
    pub id: EntityId,
}

impl EntityRef {
    /// Reference to `id` of `kind`.
    pub fn new(kind: EntityKind, id: impl Into<EntityId>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    /// Reference to a game.
    pub fn game(id: impl Into<EntityId>) -> Self {
        Self::new(EntityKind::Game, id)
    }

    /// Reference to a review.
    pub fn review(id: impl Into<EntityId>) -> Self {
        Self::new(EntityKind::Review, id)
    }

    /// Reference to a comment.
    pub fn comment(id: impl Into<EntityId>) -> Self {
        Self::new(EntityKind::Comment, id)
    }

    /// Reference to a collection.
    pub fn collection(id: impl Into<EntityId>) -> Self {
        Self::new(EntityKind::Collection, id)
    }

    /// Reference to a user.
    pub fn user(id: impl Into<EntityId>) -> Self {
        Self::new(EntityKind::User, id)
    }

    /// API path of the entity, e.g. `/games/42`.
    pub fn path(&self) -> String {
        format!("/{}/{}", self.kind.path_segment(), self.id)
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Mutable sub-fields of an entity that take part in optimistic updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// The current user's library entry for a game (`null` when not in the library).
    UserGame,
    /// Number of users who added a game to their library.
    Added,
    /// The current user's rating of a game.
    UserReview,
    /// Number of ratings a game received.
    RatingsCount,
    /// Like counter of a review or comment.
    LikesCount,
    /// Whether the current user likes a review or comment.
    UserLike,
    /// Whether the current user follows a user or collection.
    Following,
    /// Follower counter of a user or collection.
    FollowersCount,
    /// Comment counter of a commentable entity.
    CommentsCount,
    /// Whether the user joined the loyalty (token) program.
    TokenProgram,
}

impl Field {
    /// Every field, in declaration order.
    pub const ALL: [Field; 10] = [
        Field::UserGame,
        Field::Added,
        Field::UserReview,
        Field::RatingsCount,
        Field::LikesCount,
        Field::UserLike,
        Field::Following,
        Field::FollowersCount,
        Field::CommentsCount,
        Field::TokenProgram,
    ];

    /// Attribute name of the field in API payloads.
    pub fn key(&self) -> &'static str {
        match self {
            Field::UserGame => "user_game",
            Field::Added => "added",
            Field::UserReview => "user_review",
            Field::RatingsCount => "ratings_count",
            Field::LikesCount => "likes_count",
            Field::UserLike => "user_like",
            Field::Following => "following",
            Field::FollowersCount => "followers_count",
            Field::CommentsCount => "comments_count",
            Field::TokenProgram => "token_program",
        }
    }

    /// Map a payload attribute name back to its field, if it is one.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.key() == key)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A normalized record as returned by the API, keyed by its [`EntityRef`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    kind: EntityKind,
    id: EntityId,
    attributes: Map<String, Value>,
}

impl Entity {
    /// Normalize an API object into an entity. Objects without a usable `id` are rejected.
    pub fn from_payload(kind: EntityKind, attributes: Map<String, Value>) -> Option<Self> {
        let id = attributes.get("id").and_then(EntityId::from_value)?;
        Some(Self {
            kind,
            id,
            attributes,
        })
    }

    /// Key of the entity in the store.
    pub fn reference(&self) -> EntityRef {
        EntityRef::new(self.kind, self.id.clone())
    }

    /// Kind of the entity.
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Identifier of the entity.
    pub fn id(&self) -> &EntityId {
        &self.id
    }

    /// Raw attribute lookup.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Displayed value of a relation field; absent fields read as `null`.
    pub fn field(&self, field: Field) -> &Value {
        self.attributes.get(field.key()).unwrap_or(&NULL)
    }

    /// Every attribute, as last merged.
    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    pub(super) fn set_field(&mut self, field: Field, value: Value) {
        self.attributes.insert(field.key().to_string(), value);
    }

    pub(super) fn set_attribute(&mut self, key: &str, value: Value) {
        self.attributes.insert(key.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[test]
    fn entity_requires_an_id() {
        assert!(Entity::from_payload(EntityKind::Game, object(json!({"name": "Doom"}))).is_none());
        assert!(Entity::from_payload(EntityKind::Game, object(json!({"id": ""}))).is_none());

        let game = Entity::from_payload(EntityKind::Game, object(json!({"id": 42}))).unwrap();
        assert_eq!(game.reference(), EntityRef::game(42));

        let user = Entity::from_payload(EntityKind::User, object(json!({"id": "jdoe"}))).unwrap();
        assert_eq!(user.reference(), EntityRef::user("jdoe"));
    }

    #[test]
    fn missing_fields_read_as_null() {
        let game = Entity::from_payload(EntityKind::Game, object(json!({"id": 1}))).unwrap();
        assert_eq!(game.field(Field::UserGame), &Value::Null);
    }

    #[test]
    fn field_keys_round_trip() {
        for field in Field::ALL {
            assert_eq!(Field::from_key(field.key()), Some(field));
        }
        assert_eq!(Field::from_key("name"), None);
    }

    #[test]
    fn entity_paths_use_plural_segments() {
        assert_eq!(EntityRef::collection("best-rpgs").path(), "/collections/best-rpgs");
        assert_eq!(EntityRef::review(7).to_string(), "review:7");
    }
}
