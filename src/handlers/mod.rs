// HTTP handlers
//
// entities: one CRUD surface for every registered entity
// comments: public intake plus moderation
// settings: grouped key/value configuration
// payload: shared JSON/multipart body intake

pub mod comments;
pub mod entities;
pub mod payload;
pub mod settings;
