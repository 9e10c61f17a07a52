use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{Associate, AssociateError, CreateAssociateRequest, Designation, UpdateAssociateRequest};

/// Directory of service providers. The booking and availability cells read
/// the designation from here to select buffer rules; nothing writes back.
pub struct AssociateDirectoryService {
    supabase: Arc<SupabaseClient>,
}

impl AssociateDirectoryService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub async fn get_associate(
        &self,
        associate_id: Uuid,
        auth_token: &str,
    ) -> Result<Associate, AssociateError> {
        debug!("Fetching associate: {}", associate_id);

        let path = format!(
            "/rest/v1/associates?id=eq.{}&select=id,full_name,email,designation,bio,is_active,created_at,updated_at",
            associate_id
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AssociateError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(AssociateError::NotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| AssociateError::DatabaseError(format!("Failed to parse associate: {}", e)))
    }

    /// Resolve only the designation. Cheaper than a full profile fetch for
    /// callers that just need to pick a buffer rule.
    pub async fn get_associate_type(
        &self,
        associate_id: Uuid,
        auth_token: &str,
    ) -> Result<Designation, AssociateError> {
        let path = format!("/rest/v1/associates?id=eq.{}&select=designation", associate_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AssociateError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(AssociateError::NotFound);
        }

        serde_json::from_value(result[0]["designation"].clone())
            .map_err(|e| AssociateError::DatabaseError(format!("Failed to parse designation: {}", e)))
    }

    pub async fn list_associates(
        &self,
        designation: Option<Designation>,
        auth_token: &str,
    ) -> Result<Vec<Associate>, AssociateError> {
        let mut path = String::from(
            "/rest/v1/associates?is_active=eq.true&select=id,full_name,email,designation,bio,is_active,created_at,updated_at&order=full_name.asc",
        );
        if let Some(designation) = designation {
            path.push_str(&format!("&designation=eq.{}", designation));
        }

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AssociateError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Associate>, _>>()
            .map_err(|e| AssociateError::DatabaseError(format!("Failed to parse associates: {}", e)))
    }

    /// Create the associate row. The row doubles as the calendar aggregate:
    /// it is born with an empty `days` array and version 0 so availability
    /// writes always find their document.
    pub async fn create_associate(
        &self,
        request: CreateAssociateRequest,
        auth_token: &str,
    ) -> Result<Associate, AssociateError> {
        if request.full_name.trim().is_empty() {
            return Err(AssociateError::ValidationError("Full name is required".to_string()));
        }
        if !request.email.contains('@') {
            return Err(AssociateError::ValidationError("Invalid email address".to_string()));
        }

        let id = request.id.unwrap_or_else(Uuid::new_v4);
        let now = Utc::now();

        let associate_data = json!({
            "id": id,
            "full_name": request.full_name,
            "email": request.email,
            "designation": request.designation,
            "bio": request.bio,
            "is_active": true,
            "days": [],
            "version": 0,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/associates",
                Some(auth_token),
                Some(associate_data),
                Some(headers),
            )
            .await
            .map_err(|e| {
                let msg = e.to_string();
                if msg.contains("duplicate") || msg.contains("409") {
                    AssociateError::AlreadyExists
                } else {
                    AssociateError::DatabaseError(msg)
                }
            })?;

        if result.is_empty() {
            return Err(AssociateError::DatabaseError("Failed to create associate".to_string()));
        }

        let associate: Associate = serde_json::from_value(result[0].clone())
            .map_err(|e| AssociateError::DatabaseError(format!("Failed to parse created associate: {}", e)))?;

        info!("Associate created: {} ({})", associate.id, associate.designation);
        Ok(associate)
    }

    pub async fn update_associate(
        &self,
        associate_id: Uuid,
        request: UpdateAssociateRequest,
        auth_token: &str,
    ) -> Result<Associate, AssociateError> {
        debug!("Updating associate: {}", associate_id);

        let mut update_data = serde_json::Map::new();
        if let Some(full_name) = request.full_name {
            if full_name.trim().is_empty() {
                return Err(AssociateError::ValidationError("Full name cannot be empty".to_string()));
            }
            update_data.insert("full_name".to_string(), json!(full_name));
        }
        if let Some(bio) = request.bio {
            update_data.insert("bio".to_string(), json!(bio));
        }
        if let Some(is_active) = request.is_active {
            update_data.insert("is_active".to_string(), json!(is_active));
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/associates?id=eq.{}", associate_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(Value::Object(update_data)),
                Some(headers),
            )
            .await
            .map_err(|e| AssociateError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(AssociateError::NotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| AssociateError::DatabaseError(format!("Failed to parse updated associate: {}", e)))
    }
}
