use std::sync::Arc;

use crate::bot::access::PermissionGate;
use crate::config::Settings;
use crate::db::Db;
use crate::repository::EventRepository;
use crate::repository::ProfileRepository;
use crate::repository::TopicRepository;
use crate::repository::UserRepository;

#[derive(Clone)]
pub struct AppContext {
  pub events: Arc<dyn EventRepository>,
  pub topics: Arc<dyn TopicRepository>,
  pub users: Arc<dyn UserRepository>,
  pub profiles: Arc<dyn ProfileRepository>,
  pub access: Arc<dyn PermissionGate>,
  pub settings: Settings,
}

impl AppContext {
  pub fn new(db: Db, access: Arc<dyn PermissionGate>, settings: Settings) -> Self {
    let db = Arc::new(db);
    Self {
      events: db.clone(),
      topics: db.clone(),
      users: db.clone(),
      profiles: db,
      access,
      settings,
    }
  }
}
