//! Per-area attachment versions of a document.
use crate::permission::StageArea;
use crate::types::FileRef;

/// Ordered file versions for each stage area, oldest first.
///
/// Lists only grow by [`Attachments::append`] and only shrink by
/// [`Attachments::remove`] on a specific file id. Order is never changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Attachments {
    #[n(0)]
    purchasing: Vec<FileRef>,
    #[n(1)]
    billing: Vec<FileRef>,
    #[n(2)]
    operations: Vec<FileRef>,
}

impl Attachments {
    pub fn new() -> Self {
        Self::default()
    }

    fn list(&self, area: StageArea) -> &Vec<FileRef> {
        match area {
            StageArea::Purchasing => &self.purchasing,
            StageArea::Billing => &self.billing,
            StageArea::Operations => &self.operations,
        }
    }

    fn list_mut(&mut self, area: StageArea) -> &mut Vec<FileRef> {
        match area {
            StageArea::Purchasing => &mut self.purchasing,
            StageArea::Billing => &mut self.billing,
            StageArea::Operations => &mut self.operations,
        }
    }

    pub fn append(&mut self, area: StageArea, file: FileRef) {
        self.list_mut(area).push(file);
    }

    /// Removes the file with `file_id` from `area`, returning it if present.
    pub fn remove(&mut self, area: StageArea, file_id: &str) -> Option<FileRef> {
        let list = self.list_mut(area);
        let position = list.iter().position(|f| f.id == file_id)?;
        Some(list.remove(position))
    }

    pub fn latest(&self, area: StageArea) -> Option<&FileRef> {
        self.list(area).last()
    }

    pub fn versions(&self, area: StageArea) -> &[FileRef] {
        self.list(area)
    }

    pub fn contains(&self, area: StageArea, file_id: &str) -> bool {
        self.list(area).iter().any(|f| f.id == file_id)
    }

    pub fn is_empty(&self, area: StageArea) -> bool {
        self.list(area).is_empty()
    }

    /// Every attached file across all areas, in workflow then version order.
    pub fn iter_files(&self) -> impl Iterator<Item = (StageArea, &FileRef)> {
        StageArea::ALL
            .into_iter()
            .flat_map(move |area| self.list(area).iter().map(move |f| (area, f)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(n: u32) -> FileRef {
        FileRef::new(format!("file_{n}"), format!("{n}.pdf"))
    }

    #[test]
    fn append_keeps_submission_order() {
        let mut attachments = Attachments::new();
        for n in 0..4 {
            attachments.append(StageArea::Billing, file(n));
        }

        let ids: Vec<_> = attachments
            .versions(StageArea::Billing)
            .iter()
            .map(|f| f.id.as_str())
            .collect();
        assert_eq!(ids, ["file_0", "file_1", "file_2", "file_3"]);
        assert_eq!(attachments.latest(StageArea::Billing), Some(&file(3)));
        assert!(attachments.is_empty(StageArea::Purchasing));
    }

    #[test]
    fn remove_targets_one_file_and_keeps_order() {
        let mut attachments = Attachments::new();
        for n in 0..3 {
            attachments.append(StageArea::Operations, file(n));
        }

        assert_eq!(attachments.remove(StageArea::Operations, "file_1"), Some(file(1)));
        assert_eq!(attachments.remove(StageArea::Operations, "file_1"), None);
        assert_eq!(
            attachments.versions(StageArea::Operations),
            &[file(0), file(2)]
        );
    }

    #[test]
    fn remove_is_scoped_to_the_area() {
        let mut attachments = Attachments::new();
        attachments.append(StageArea::Purchasing, file(7));

        assert_eq!(attachments.remove(StageArea::Billing, "file_7"), None);
        assert!(attachments.contains(StageArea::Purchasing, "file_7"));
    }

    #[test]
    fn iter_files_walks_areas_in_workflow_order() {
        let mut attachments = Attachments::new();
        attachments.append(StageArea::Operations, file(3));
        attachments.append(StageArea::Purchasing, file(1));
        attachments.append(StageArea::Billing, file(2));

        let areas: Vec<_> = attachments.iter_files().map(|(a, _)| a).collect();
        assert_eq!(areas, StageArea::ALL.to_vec());
    }
}
