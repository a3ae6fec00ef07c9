// File transfer and iFile endpoints
//
// Files reach the device through the file-transfer worker, which stores them
// under /var/config/rest/downloads. Objects that consume a file (iFiles,
// FAST template sets) then reference it from there.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::ltm::rest_name;
use super::BigIpClient;
use crate::error::ProviderError;

/// File-transfer upload endpoint.
pub const FILE_UPLOADS: &str = "/mgmt/shared/file-transfer/uploads";
/// Where uploaded files land on the device.
pub const DOWNLOADS_DIR: &str = "/var/config/rest/downloads";
/// iFile collection.
pub const SYS_IFILE: &str = "/mgmt/tm/sys/file/ifile";

/// Largest chunk the file-transfer worker accepts in one request.
pub const UPLOAD_CHUNK: usize = 1024 * 1024;

/// An iFile as iControl REST represents it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SysIFile {
    /// iFile name.
    pub name: String,
    /// Partition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition: Option<String>,
    /// Folder within the partition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_path: Option<String>,
    /// `file:` URL the content is copied from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
    /// As read back.
    #[serde(default, skip_serializing)]
    pub full_path: Option<String>,
    /// Content checksum, as read back.
    #[serde(default, skip_serializing)]
    pub checksum: Option<String>,
    /// Content size in bytes, as read back.
    #[serde(default, skip_serializing)]
    pub size: Option<u64>,
}

/// The `start-end/total` ranges a file of `total` bytes is uploaded in.
pub fn chunk_ranges(total: usize) -> Vec<(usize, usize)> {
    (0..total)
        .step_by(UPLOAD_CHUNK)
        .map(|start| (start, (start + UPLOAD_CHUNK).min(total)))
        .collect()
}

impl BigIpClient {
    /// Upload `content` as `file_name`. Returns the path the device stored
    /// it at.
    pub async fn upload_file(&self, file_name: &str, content: &[u8]) -> Result<String, ProviderError> {
        if content.is_empty() {
            return Err(ProviderError::Validation(format!(
                "refusing to upload empty file {file_name}"
            )));
        }
        let path = format!("{FILE_UPLOADS}/{file_name}");
        let total = content.len();
        for (start, end) in chunk_ranges(total) {
            let range = format!("{}-{}/{}", start, end - 1, total);
            self.send_chunk(&path, content[start..end].to_vec(), &range)
                .await?;
        }
        Ok(format!("{DOWNLOADS_DIR}/{file_name}"))
    }

    /// Create an iFile from an uploaded file.
    pub async fn sys_ifile_create(&self, ifile: &SysIFile) -> Result<(), ProviderError> {
        self.post(SYS_IFILE, &serde_json::to_value(ifile)?).await?;
        Ok(())
    }

    /// Fetch an iFile by full path.
    pub async fn sys_ifile(&self, full_path: &str) -> Result<SysIFile, ProviderError> {
        let resp = self
            .get(&format!("{SYS_IFILE}/{}", rest_name(full_path)))
            .await?;
        resp.json()
    }

    /// Point an iFile at new content.
    pub async fn sys_ifile_replace(&self, full_path: &str, source_path: &str) -> Result<(), ProviderError> {
        let body: Value = json!({ "sourcePath": source_path });
        self.patch(&format!("{SYS_IFILE}/{}", rest_name(full_path)), &body)
            .await?;
        Ok(())
    }

    /// Delete an iFile.
    pub async fn sys_ifile_delete(&self, full_path: &str) -> Result<(), ProviderError> {
        self.delete(&format!("{SYS_IFILE}/{}", rest_name(full_path)))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_ranges() {
        assert_eq!(chunk_ranges(10), vec![(0, 10)]);
        assert_eq!(
            chunk_ranges(UPLOAD_CHUNK * 2 + 5),
            vec![
                (0, UPLOAD_CHUNK),
                (UPLOAD_CHUNK, UPLOAD_CHUNK * 2),
                (UPLOAD_CHUNK * 2, UPLOAD_CHUNK * 2 + 5)
            ]
        );
        assert!(chunk_ranges(0).is_empty());
    }

    #[test]
    fn test_ifile_wire_shape() {
        let ifile = SysIFile {
            name: "page".into(),
            partition: Some("Common".into()),
            source_path: Some("file:/var/config/rest/downloads/page".into()),
            checksum: Some("SHA1:12:abc".into()),
            ..SysIFile::default()
        };
        let body = serde_json::to_value(&ifile).unwrap();
        assert_eq!(
            body,
            json!({
                "name": "page",
                "partition": "Common",
                "sourcePath": "file:/var/config/rest/downloads/page"
            })
        );
    }
}
