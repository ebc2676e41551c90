//! Flat-file clinical records store.
//!
//! Records live in a single pretty-printed JSON array. The file is small and read whole on
//! every request; writes rewrite the entire file.
//!
//! Writes go through the raw JSON values, so keys this crate does not model (and `null`
//! values) survive an append or a seed unchanged.

use crate::{ClinicalRecord, EhrError, EhrResult};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug)]
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every stored record exactly as written, in file order.
    ///
    /// # Errors
    ///
    /// - `EhrError::RecordsNotFound` if the file does not exist
    /// - `EhrError::FileRead` for any other I/O failure
    /// - `EhrError::Deserialization` if the file is not a JSON array
    pub fn list_raw(&self) -> EhrResult<Vec<Value>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(EhrError::RecordsNotFound(self.path.clone()))
            }
            Err(e) => return Err(EhrError::FileRead(e)),
        };

        serde_json::from_str(&contents).map_err(EhrError::Deserialization)
    }

    /// Read every stored record as a [`ClinicalRecord`], in file order.
    ///
    /// Missing or `null` fields take their defaults; unknown keys are ignored.
    pub fn list(&self) -> EhrResult<Vec<ClinicalRecord>> {
        self.list_raw()?
            .into_iter()
            .map(|value| serde_json::from_value(value).map_err(EhrError::Deserialization))
            .collect()
    }

    /// Append `records` and rewrite the file. A missing file is treated as empty.
    ///
    /// Returns the total number of stored records.
    pub fn append(&self, records: Vec<ClinicalRecord>) -> EhrResult<usize> {
        let mut all = self.list_or_empty()?;
        for record in records {
            all.push(serde_json::to_value(record).map_err(EhrError::Serialization)?);
        }
        self.write_all(&all)?;
        Ok(all.len())
    }

    /// Append the demo records whose ids are not stored yet.
    ///
    /// Returns how many records were added; running it twice adds nothing the second time.
    pub fn seed(&self) -> EhrResult<usize> {
        let existing: HashSet<u64> = self
            .list_or_empty()?
            .iter()
            .filter_map(|v| v.get("patient_id").and_then(Value::as_u64))
            .collect();

        let missing: Vec<ClinicalRecord> = seed_records()
            .into_iter()
            .filter(|r| !existing.contains(&r.patient_id))
            .collect();

        let added = missing.len();
        if added > 0 {
            self.append(missing)?;
        }
        tracing::info!("seeded {} record(s) into {}", added, self.path.display());
        Ok(added)
    }

    fn list_or_empty(&self) -> EhrResult<Vec<Value>> {
        match self.list_raw() {
            Err(EhrError::RecordsNotFound(_)) => Ok(Vec::new()),
            other => other,
        }
    }

    fn write_all(&self, records: &[Value]) -> EhrResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(EhrError::StorageDirCreation)?;
            }
        }

        let json = serde_json::to_string_pretty(records).map_err(EhrError::Serialization)?;
        fs::write(&self.path, json).map_err(EhrError::FileWrite)
    }
}

#[allow(clippy::too_many_arguments)]
fn record(
    patient_id: u64,
    patient_name: &str,
    age: u32,
    gender: &str,
    provisional_diagnosis: &str,
    symptoms: &str,
    mri_findings: &str,
    clinical_note: &str,
    icd10: (&str, &str),
) -> ClinicalRecord {
    ClinicalRecord {
        patient_id,
        patient_name: patient_name.into(),
        age,
        gender: gender.into(),
        provisional_diagnosis: provisional_diagnosis.into(),
        symptoms: symptoms.into(),
        mri_findings: mri_findings.into(),
        clinical_note: clinical_note.into(),
        icd10_code: icd10.0.into(),
        icd10_description: icd10.1.into(),
    }
}

/// The three demo patients used to populate a fresh records file.
pub fn seed_records() -> Vec<ClinicalRecord> {
    vec![
        record(
            99001,
            "Vikram Malhotra",
            58,
            "Male",
            "Malignant Brain Tumor",
            "Severe morning headaches, nausea, visual disturbances",
            "Large enhancing mass in right parietal lobe with central necrosis and surrounding edema.",
            "Vikram Malhotra, 58-year-old male, presents with severe morning headaches and visual \
             disturbances. MRI reveals a large enhancing mass in the right parietal lobe with \
             features suggestive of a high-grade glioma (Glioblastoma). Immediate neurosurgical and \
             oncological consultation is required. Starting dexamethasone for edema management.",
            ("C71.3", "Malignant neoplasm of parietal lobe"),
        ),
        record(
            99002,
            "Anjali Desai",
            34,
            "Female",
            "Benign Brain Tumor",
            "Unilateral hearing loss, mild imbalance",
            "Well-circumscribed mass in the left cerebellopontine angle, enhancing homogeneously.",
            "Anjali Desai, 34-year-old female, presents with left-sided hearing loss and mild \
             imbalance. MRI shows a well-circumscribed lesion in the left cerebellopontine angle, \
             consistent with Vestibular Schwannoma (Acoustic Neuroma). The lesion appears benign. \
             Management options including observation vs. radiosurgery discussed.",
            ("D33.3", "Benign neoplasm of cranial nerves"),
        ),
        record(
            99003,
            "Rahul Verma",
            29,
            "Male",
            "No Tumor",
            "Band-like tightness around head, stress related",
            "Normal brain parenchyma. No intracranial mass or abnormal enhancement.",
            "Rahul Verma, 29-year-old male, complains of chronic band-like headache exacerbated by \
             work stress. Neurological exam is normal. MRI Brain is completely normal, ruling out \
             intracranial pathology. Diagnosis is Tension-Type Headache. Reassured patient. \
             Prescribed analgesics and stress management techniques.",
            ("G44.2", "Tension-type headache"),
        ),
    ]
}
