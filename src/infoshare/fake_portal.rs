// In-memory stand-in for the Infoshare site, used by the tests of this module tree.

use std::{cell::RefCell, collections::HashMap, error::Error, path::Path, rc::Rc};

use crate::session::{
    CatalogueNode, PortalSession, SessionConfig, SessionFactory, TreeLevel, VariableBox,
};

use super::navigate::DatasetRef;

#[derive(Debug, Clone)]
pub struct FakeDataset {
    pub boxes: Vec<VariableBox>,
    pub metadata: String,
}

#[derive(Debug, Default)]
struct PortalLog {
    opened: usize,
    closed: usize,
    requested_cells: Vec<u64>,
    download_dirs: Vec<String>,
    browser_args: Vec<&'static str>,
}

#[derive(Clone)]
pub struct FakePortal {
    catalogue: Rc<Vec<CatalogueNode>>,
    datasets: Rc<HashMap<DatasetRef, FakeDataset>>,
    log: Rc<RefCell<PortalLog>>,
}

impl FakePortal {
    pub fn new(datasets: Vec<(DatasetRef, FakeDataset)>, extra: Vec<CatalogueNode>) -> FakePortal {
        let mut catalogue: Vec<CatalogueNode> = Vec::new();
        for (r, _) in &datasets {
            let category = match catalogue.iter().position(|c| c.name == r.category) {
                Some(i) => &mut catalogue[i],
                None => {
                    catalogue.push(CatalogueNode::leaf(&r.category));
                    catalogue.last_mut().unwrap()
                }
            };
            let group = match category.children.iter().position(|g| g.name == r.group) {
                Some(i) => &mut category.children[i],
                None => {
                    category.children.push(CatalogueNode::leaf(&r.group));
                    category.children.last_mut().unwrap()
                }
            };
            group.children.push(CatalogueNode::leaf(&r.dataset));
        }
        // extra nodes are merged in by category name
        for node in extra {
            match catalogue.iter_mut().find(|c| c.name == node.name) {
                Some(category) => category.children.extend(node.children),
                None => catalogue.push(node),
            }
        }
        FakePortal {
            catalogue: Rc::new(catalogue),
            datasets: Rc::new(datasets.into_iter().collect()),
            log: Rc::new(RefCell::new(PortalLog::default())),
        }
    }

    pub fn exports_ref() -> DatasetRef {
        DatasetRef::new(
            "Imports and exports",
            "Overseas Cargo Statistics - OSC",
            "Total Exports by New Zealand Port (Monthly)",
        )
    }

    pub fn imports_ref() -> DatasetRef {
        DatasetRef::new(
            "Imports and exports",
            "Overseas Cargo Statistics - OSC",
            "Total Imports by New Zealand Port (Monthly)",
        )
    }

    pub fn session(&self) -> FakeSession {
        self.log.borrow_mut().opened += 1;
        FakeSession {
            portal: self.clone(),
            path: Vec::new(),
            selected: Vec::new(),
            submitted: false,
            status_flags: false,
        }
    }

    pub fn sessions_opened(&self) -> usize {
        self.log.borrow().opened
    }

    pub fn sessions_closed(&self) -> usize {
        self.log.borrow().closed
    }

    pub fn requested_cells(&self) -> Vec<u64> {
        self.log.borrow().requested_cells.clone()
    }

    /// The `browser.download.dir` preference of every session opened.
    pub fn download_dirs(&self) -> Vec<String> {
        self.log.borrow().download_dirs.clone()
    }

    /// Browser arguments of the last session opened.
    pub fn browser_args(&self) -> Vec<&'static str> {
        self.log.borrow().browser_args.clone()
    }
}

impl SessionFactory for FakePortal {
    type Session = FakeSession;

    fn open(&self, config: &SessionConfig, _url: &str) -> Result<FakeSession, Box<dyn Error>> {
        let download_dir = config
            .profile_preferences()
            .into_iter()
            .find(|(name, _)| *name == "browser.download.dir")
            .map(|(_, value)| value.to_string())
            .ok_or("no download dir preference")?;
        if !Path::new(&download_dir).is_absolute() {
            return Err("relative download dir".into());
        }
        {
            let mut log = self.log.borrow_mut();
            log.download_dirs.push(download_dir);
            log.browser_args = config.browser_args();
        }
        Ok(self.session())
    }
}

pub struct FakeSession {
    portal: FakePortal,
    path: Vec<String>,
    selected: Vec<(String, String)>,
    submitted: bool,
    status_flags: bool,
}

impl FakeSession {
    pub fn open_dataset(&self) -> Option<DatasetRef> {
        match self.path.as_slice() {
            [c, g, d] => Some(DatasetRef::new(c, g, d)),
            _ => None,
        }
    }

    fn dataset(&self) -> Result<&FakeDataset, Box<dyn Error>> {
        let r = self.open_dataset().ok_or("no dataset page open")?;
        self.portal
            .datasets
            .get(&r)
            .ok_or_else(|| format!("dataset {} has no selection page", r).into())
    }

    fn selected_for(&self, title: &str) -> Vec<String> {
        self.selected
            .iter()
            .filter(|(t, _)| t == title)
            .map(|(_, o)| o.clone())
            .collect()
    }
}

impl PortalSession for FakeSession {
    fn click_tree_node(&mut self, level: TreeLevel, label: &str) -> Result<bool, Box<dyn Error>> {
        let depth = match level {
            TreeLevel::Category => 0,
            TreeLevel::Group => 1,
            TreeLevel::Dataset => 2,
        };
        if self.path.len() < depth {
            return Ok(false);
        }
        let mut nodes: &[CatalogueNode] = &self.portal.catalogue;
        for name in &self.path[..depth] {
            match nodes.iter().find(|n| &n.name == name) {
                Some(node) => nodes = &node.children,
                None => return Ok(false),
            }
        }
        match nodes.iter().find(|n| n.name.contains(label)) {
            Some(node) => {
                self.path.truncate(depth);
                self.path.push(node.name.clone());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn variable_boxes(&mut self) -> Result<Vec<VariableBox>, Box<dyn Error>> {
        Ok(self.dataset()?.boxes.clone())
    }

    fn select_option(&mut self, title: &str, option: &str) -> Result<(), Box<dyn Error>> {
        let dataset = self.dataset()?;
        let vbox = dataset
            .boxes
            .iter()
            .find(|b| b.title == title)
            .ok_or_else(|| format!("no variable box '{}'", title))?;
        if !vbox.options.iter().any(|o| o == option) {
            return Err(format!("no option '{}' in '{}'", option, title).into());
        }
        self.selected.push((title.to_string(), option.to_string()));
        Ok(())
    }

    fn submit(&mut self) -> Result<(), Box<dyn Error>> {
        let boxes = self.dataset()?.boxes.clone();
        let cells: u64 = boxes
            .iter()
            .map(|b| self.selected_for(&b.title).len() as u64)
            .product();
        self.portal.log.borrow_mut().requested_cells.push(cells);
        self.submitted = true;
        Ok(())
    }

    fn show_status_flags(&mut self) -> Result<(), Box<dyn Error>> {
        self.status_flags = true;
        Ok(())
    }

    /// Columns are every combination of the non-time variables, one header row per
    /// variable.  Rows are the selected time periods in page order.
    fn data_table(&mut self) -> Result<Vec<Vec<String>>, Box<dyn Error>> {
        if !self.submitted {
            return Err("table requested before submitting".into());
        }
        let boxes = self.dataset()?.boxes.clone();
        let mut combos: Vec<Vec<String>> = vec![Vec::new()];
        for vbox in boxes.iter().filter(|b| b.title != "Time") {
            let options = self.selected_for(&vbox.title);
            combos = combos
                .into_iter()
                .flat_map(|c| {
                    options.iter().map(move |o| {
                        let mut next = c.clone();
                        next.push(o.clone());
                        next
                    })
                })
                .collect();
        }
        let levels = combos.first().map(|c| c.len()).unwrap_or(0);
        let mut grid = Vec::new();
        for level in 0..levels {
            let mut row = vec![String::new()];
            row.extend(combos.iter().map(|c| c[level].clone()));
            grid.push(row);
        }
        for time in self.selected_for("Time") {
            let mut row = vec![time.clone()];
            for combo in &combos {
                let flag = if self.status_flags { " P" } else { "" };
                row.push(format!("{}|{}{}", time, combo.join("|"), flag));
            }
            grid.push(row);
        }
        Ok(grid)
    }

    fn metadata_text(&mut self) -> Result<String, Box<dyn Error>> {
        Ok(self.dataset()?.metadata.clone())
    }

    fn catalogue(&mut self) -> Result<Vec<CatalogueNode>, Box<dyn Error>> {
        Ok(self.portal.catalogue.as_ref().clone())
    }

    fn close(self) -> Result<(), Box<dyn Error>> {
        self.portal.log.borrow_mut().closed += 1;
        Ok(())
    }
}

pub fn monthly_periods(from_year: i16, to_year: i16) -> Vec<String> {
    let mut periods = Vec::new();
    for year in from_year..=to_year {
        for month in 1..=12 {
            periods.push(format!("{}M{:02}", year, month));
        }
    }
    periods
}

fn vbox(title: &str, options: &[&str]) -> VariableBox {
    VariableBox {
        title: title.to_string(),
        options: options.iter().map(|s| s.to_string()).collect(),
    }
}

fn cargo_dataset(observations: &[&str]) -> FakeDataset {
    let mut time = vec![String::new()];
    time.extend(monthly_periods(2020, 2021));
    FakeDataset {
        boxes: vec![
            vbox(
                "New Zealand Port",
                &["Auckland (sea)", "Lyttelton (sea)", "Napier (sea)", "Christchurch Airport"],
            ),
            vbox("Observations", observations),
            VariableBox {
                title: "Time".to_string(),
                options: time,
            },
        ],
        metadata: "\n  Table reference: OSC001AA\n\n\n\nLast updated 15 September 2021\n".to_string(),
    }
}

/// Two cargo datasets plus a category holding one of the pseudo groups that the
/// catalogue crawl skips.
pub fn cargo_portal() -> FakePortal {
    FakePortal::new(
        vec![
            (
                FakePortal::exports_ref(),
                cargo_dataset(&["FOB (free on board) NZ$(000)", "Gross weight (tonnes)"]),
            ),
            (
                FakePortal::imports_ref(),
                cargo_dataset(&[
                    "CIF (cost, insurance and freight) NZ$(000)",
                    "Gross weight (tonnes)",
                ]),
            ),
        ],
        vec![CatalogueNode::branch(
            "Imports and exports",
            vec![CatalogueNode::branch(
                "Harmonised Trade - Exports",
                vec![CatalogueNode::leaf("Exports - HS10 by Country")],
            )],
        )],
    )
}
