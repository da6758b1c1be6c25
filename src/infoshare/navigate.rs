use std::{error::Error, fmt};

use serde::{Deserialize, Serialize};

use crate::session::{PortalSession, TreeLevel};

use super::InfoshareError;

/// Location of a dataset in the Infoshare browse tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetRef {
    pub category: String,
    pub group: String,
    pub dataset: String,
}

impl DatasetRef {
    pub fn new(category: &str, group: &str, dataset: &str) -> DatasetRef {
        DatasetRef {
            category: category.to_string(),
            group: group.to_string(),
            dataset: dataset.to_string(),
        }
    }
}

impl fmt::Display for DatasetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {} / {}", self.category, self.group, self.dataset)
    }
}

/// Click through category, group and dataset to reach the dataset's selection page.
pub fn navigate_to_dataset<S: PortalSession>(
    session: &mut S,
    dataset_ref: &DatasetRef,
) -> Result<(), Box<dyn Error>> {
    let steps = [
        (TreeLevel::Category, &dataset_ref.category, "folder"),
        (TreeLevel::Group, &dataset_ref.group, "folder"),
        (TreeLevel::Dataset, &dataset_ref.dataset, "link"),
    ];
    for (level, label, kind) in steps {
        if !session.click_tree_node(level, label)? {
            return Err(Box::new(InfoshareError::NodeNotFound(format!(
                "'{}' {} not found.",
                label, kind
            ))));
        }
    }
    Ok(())
}
