//! Typed bindings for the Farmstead REST endpoints.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::client::ApiClient;
use super::error::NetworkError;
use crate::models::{Camera, Credentials, Device, Farm, Owner, SensorReading, Silo, Weather};

/// Endpoint paths, relative to the API base URL.
pub mod paths {
    use uuid::Uuid;

    pub const AUTHENTICATE: &str = "/api/owner/authenticate";
    pub const OWNERS: &str = "/api/owner";

    pub fn owner(owner_id: Uuid) -> String {
        format!("/api/owner/{}", owner_id)
    }

    pub fn farms(owner_id: Uuid) -> String {
        format!("/api/farms/{}", owner_id)
    }

    pub fn farm(farm_id: Uuid) -> String {
        format!("/api/farms/{}", farm_id)
    }

    pub fn devices(owner_id: Uuid, farm_id: Uuid) -> String {
        format!("/api/devices/{}/{}", owner_id, farm_id)
    }

    pub fn device(device_id: Uuid) -> String {
        format!("/api/devices/{}", device_id)
    }

    pub fn sensor_data(device_id: Uuid) -> String {
        format!("/api/sensor-data/{}", device_id)
    }

    pub fn silos(farm_id: Uuid) -> String {
        format!("/api/silos/{}", farm_id)
    }

    pub fn silo(silo_id: Uuid) -> String {
        format!("/api/silos/{}", silo_id)
    }

    pub fn cameras(farm_id: Uuid, owner_id: Uuid) -> String {
        format!("/api/cameras/{}/{}", farm_id, owner_id)
    }

    pub fn camera(camera_id: Uuid) -> String {
        format!("/api/cameras/{}", camera_id)
    }

    pub fn weather(farm_id: Uuid) -> String {
        format!("/api/weather/{}", farm_id)
    }
}

impl ApiClient {
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<Owner, NetworkError> {
        self.post(paths::AUTHENTICATE, credentials).await
    }

    /// Registers a new owner; the response carries the server-assigned id.
    pub async fn register_owner(&self, owner: &Owner) -> Result<Owner, NetworkError> {
        self.post(paths::OWNERS, owner).await
    }

    pub async fn update_owner(&self, owner_id: Uuid, owner: &Owner) -> Result<Owner, NetworkError> {
        self.put(&paths::owner(owner_id), owner).await
    }

    pub async fn farms(&self, owner_id: Uuid) -> Result<Vec<Farm>, NetworkError> {
        self.get(&paths::farms(owner_id), None).await
    }

    pub async fn create_farm(&self, owner_id: Uuid, farm: &Farm) -> Result<Farm, NetworkError> {
        self.post(&paths::farms(owner_id), farm).await
    }

    pub async fn update_farm(&self, farm: &Farm) -> Result<Farm, NetworkError> {
        self.put(&paths::farm(farm.id), farm).await
    }

    pub async fn delete_farm(&self, farm_id: Uuid) -> Result<(), NetworkError> {
        self.delete(&paths::farm(farm_id)).await
    }

    pub async fn devices(&self, owner_id: Uuid, farm_id: Uuid) -> Result<Vec<Device>, NetworkError> {
        self.get(&paths::devices(owner_id, farm_id), None).await
    }

    pub async fn create_device(
        &self,
        owner_id: Uuid,
        farm_id: Uuid,
        device: &Device,
    ) -> Result<Device, NetworkError> {
        self.post(&paths::devices(owner_id, farm_id), device).await
    }

    pub async fn update_device(&self, device: &Device) -> Result<Device, NetworkError> {
        self.put(&paths::device(device.id), device).await
    }

    pub async fn delete_device(&self, device_id: Uuid) -> Result<(), NetworkError> {
        self.delete(&paths::device(device_id)).await
    }

    /// Fetches readings for a device, optionally only those captured after `since`.
    pub async fn sensor_readings(
        &self,
        device_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<SensorReading>, NetworkError> {
        let query = since.map(|t| [("from", t.timestamp_millis().to_string())]);
        self.get(
            &paths::sensor_data(device_id),
            query.as_ref().map(|q| q.as_slice()),
        )
        .await
    }

    pub async fn silos(&self, farm_id: Uuid) -> Result<Vec<Silo>, NetworkError> {
        self.get(&paths::silos(farm_id), None).await
    }

    pub async fn create_silo(&self, farm_id: Uuid, silo: &Silo) -> Result<Silo, NetworkError> {
        self.post(&paths::silos(farm_id), silo).await
    }

    pub async fn delete_silo(&self, silo_id: Uuid) -> Result<(), NetworkError> {
        self.delete(&paths::silo(silo_id)).await
    }

    pub async fn cameras(&self, farm_id: Uuid, owner_id: Uuid) -> Result<Vec<Camera>, NetworkError> {
        self.get(&paths::cameras(farm_id, owner_id), None).await
    }

    pub async fn create_camera(
        &self,
        farm_id: Uuid,
        owner_id: Uuid,
        camera: &Camera,
    ) -> Result<Camera, NetworkError> {
        self.post(&paths::cameras(farm_id, owner_id), camera).await
    }

    pub async fn delete_camera(&self, camera_id: Uuid) -> Result<(), NetworkError> {
        self.delete(&paths::camera(camera_id)).await
    }

    pub async fn weather(&self, farm_id: Uuid) -> Result<Weather, NetworkError> {
        self.get(&paths::weather(farm_id), None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, Query};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use std::collections::HashMap;

    async fn spawn_server(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_paths() {
        let owner = Uuid::nil();
        let farm = Uuid::new_v4();
        assert_eq!(
            paths::devices(owner, farm),
            format!("/api/devices/{}/{}", owner, farm)
        );
        assert_eq!(
            paths::cameras(farm, owner),
            format!("/api/cameras/{}/{}", farm, owner)
        );
        assert_eq!(paths::weather(farm), format!("/api/weather/{}", farm));
    }

    #[tokio::test]
    async fn test_authenticate_posts_credentials() {
        let router = Router::new().route(
            "/api/owner/authenticate",
            post(|Json(credentials): Json<Credentials>| async move {
                let owner = Owner::new("Ana", credentials.email, credentials.password)
                    .with_id(Uuid::nil());
                Json(owner)
            }),
        );
        let client = ApiClient::new(spawn_server(router).await, "key");

        let owner = client
            .authenticate(&Credentials::new("ana@example.com", "pw"))
            .await
            .unwrap();
        assert_eq!(owner.id, Some(Uuid::nil()));
        assert_eq!(owner.email, "ana@example.com");
    }

    #[tokio::test]
    async fn test_sensor_readings_sends_from_parameter() {
        let router = Router::new().route(
            "/api/sensor-data/{device_id}",
            get(
                |Path(device_id): Path<Uuid>,
                 Query(params): Query<HashMap<String, String>>| async move {
                    let from: i64 = params
                        .get("from")
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(0);
                    let captured = DateTime::from_timestamp_millis(from + 1).unwrap();
                    Json(vec![SensorReading::new(device_id, "temperature", 20.0, captured)])
                },
            ),
        );
        let client = ApiClient::new(spawn_server(router).await, "key");
        let device_id = Uuid::new_v4();
        let since = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();

        let readings = client.sensor_readings(device_id, Some(since)).await.unwrap();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].device_id, device_id);
        assert_eq!(
            readings[0].captured_at.timestamp_millis(),
            1_700_000_000_001
        );
    }
}
