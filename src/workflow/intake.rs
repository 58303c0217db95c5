//! Three phase Adstream intake: register a placeholder, upload the bytes,
//! then complete the media so it shows up in the web interface.
//!
//! A phase only starts once the previous one succeeded. The first failure
//! ends the job; recovery is a full retry on a later run.

use anyhow::Result;
use log::{info, warn};
use serde::Deserialize;
use std::path::Path;

use crate::common::REGISTER_STATUS_OK;
use crate::common::errors::{IntakeFailure, handle_error};
use crate::utils::fs_utils::{Archiver, read_file_with_retry};
use crate::workflow::types::{IntakeRecord, Job, Phase};

/// One item of the register-media response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredMedia {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub reference: String,
    #[serde(default)]
    pub storage_id: String,
    pub status: String,
    #[serde(default)]
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

/// The Adstream calls intake needs. Transport errors come back as `Err`,
/// HTTP level outcomes as data for the state machine to judge.
pub trait Catalog {
    fn register(&self, folder_id: &str, file_name: &str) -> Result<Vec<RegisteredMedia>>;

    /// PUT the bytes to a pre-signed target. Returns the HTTP status.
    fn upload(&self, upload_target: &str, bytes: Vec<u8>) -> Result<u16>;

    fn finalize(
        &self,
        folder_id: &str,
        resource_id: &str,
        file_name: &str,
    ) -> Result<CatalogResponse>;
}

pub struct IntakeMachine<'a, C: Catalog + ?Sized, A: Archiver + ?Sized> {
    catalog: &'a C,
    archiver: &'a A,
    register_folder_id: Option<&'a str>,
}

impl<'a, C: Catalog + ?Sized, A: Archiver + ?Sized> IntakeMachine<'a, C, A> {
    pub fn new(catalog: &'a C, archiver: &'a A, register_folder_id: Option<&'a str>) -> Self {
        Self {
            catalog,
            archiver,
            register_folder_id,
        }
    }

    /// Drive one job to `Finalized`, or stop at the first failed phase.
    pub fn run(&self, job: &Job) -> Result<IntakeRecord, IntakeFailure> {
        let mut record = self.register(&job.file_name, &job.destination.container_id)?;

        let outcome = read_file_with_retry(&job.destination.local_path)
            .map_err(|err| IntakeFailure::transfer(format!("{:#}", err)))
            .and_then(|bytes| self.transfer(&mut record, bytes))
            .and_then(|()| self.finalize(&mut record, &job.destination.local_path));

        match outcome {
            Ok(()) => Ok(record),
            Err(failure) => {
                record.phase = Phase::Failed;
                warn!(
                    "Placeholder {} for {} was registered but not completed; it may be orphaned in Adstream",
                    record.resource_id, record.file_name
                );
                Err(failure)
            }
        }
    }

    pub fn register(
        &self,
        file_name: &str,
        container_id: &str,
    ) -> Result<IntakeRecord, IntakeFailure> {
        let folder_id = self.register_folder_id.unwrap_or(container_id);
        info!("Registering new media placeholder for: {}", file_name);

        let response = self
            .catalog
            .register(folder_id, file_name)
            .map_err(|err| IntakeFailure::register(format!("{:#}", err)))?;

        let media = response
            .into_iter()
            .next()
            .ok_or_else(|| IntakeFailure::register("empty register response"))?;

        if media.status != REGISTER_STATUS_OK {
            return Err(IntakeFailure::register(format!(
                "status {:?}, response: {:?}",
                media.status, media
            )));
        }
        info!("Register media successful for: {} (id {})", file_name, media.id);

        let file_name = if media.filename.is_empty() {
            file_name.to_string()
        } else {
            media.filename
        };
        Ok(IntakeRecord {
            resource_id: media.id,
            upload_target: media.url,
            destination_folder_id: container_id.to_string(),
            file_name,
            phase: Phase::Registered,
        })
    }

    pub fn transfer(&self, record: &mut IntakeRecord, bytes: Vec<u8>) -> Result<(), IntakeFailure> {
        info!(
            "Begin media upload for: {} ({} bytes)",
            record.file_name,
            bytes.len()
        );
        let status = self
            .catalog
            .upload(&record.upload_target, bytes)
            .map_err(|err| IntakeFailure::transfer(format!("{:#}", err)))?;

        if !(200..300).contains(&status) {
            return Err(IntakeFailure::transfer(format!(
                "upload returned status {}",
                status
            )));
        }
        record.phase = Phase::Transferred;
        info!("Upload to Adstream complete for: {}", record.file_name);
        Ok(())
    }

    /// Complete the media, then move the source file out of the watch folder.
    pub fn finalize(&self, record: &mut IntakeRecord, source: &Path) -> Result<(), IntakeFailure> {
        info!("Starting the media completion step for {}", record.file_name);
        let response = self
            .catalog
            .finalize(
                &record.destination_folder_id,
                &record.resource_id,
                &record.file_name,
            )
            .map_err(|err| IntakeFailure::finalize(format!("{:#}", err)))?;

        if !(200..300).contains(&response.status) || !response.body.is_object() {
            return Err(IntakeFailure::finalize(format!(
                "unexpected response {}: {}",
                response.status, response.body
            )));
        }
        record.phase = Phase::Finalized;
        info!(
            "{} now available in the Adstream web interface",
            record.file_name
        );

        // The asset exists in Adstream now; a failed move must not fail the job
        match self.archiver.archive(source) {
            Ok(archived) => info!("Archived {:?} to {:?}", source, archived),
            Err(err) => {
                handle_error(err.context(format!("Failed to archive {:?}", source)));
            }
        }
        Ok(())
    }
}
