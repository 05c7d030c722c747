//! The region hierarchy, as stored in `structures.json`.

use std::collections::HashMap;

use brainrender_core::{BrainrenderError, Result};
use serde::{Deserialize, Serialize};

/// One brain structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureRecord {
    pub id: u32,
    pub acronym: String,
    pub name: String,
    pub rgb_triplet: [u8; 3],
    /// Filled from `structure_id_path` when absent.
    #[serde(default)]
    pub parent_id: Option<u32>,
    /// Ids from the root down to this structure.
    #[serde(default)]
    pub structure_id_path: Vec<u32>,
}

/// A tree of structures with a single root.
#[derive(Debug, Clone)]
pub struct Hierarchy {
    records: Vec<StructureRecord>,
    by_id: HashMap<u32, usize>,
    by_acronym: HashMap<String, usize>,
    children: Vec<Vec<usize>>,
    root: usize,
}

impl Hierarchy {
    /// Indexes `records`, checking that ids and acronyms are unique, every
    /// parent exists and there is exactly one root.
    pub fn new(mut records: Vec<StructureRecord>) -> Result<Self> {
        if records.is_empty() {
            return Err(BrainrenderError::invalid("atlas hierarchy is empty"));
        }
        let mut by_id = HashMap::new();
        let mut by_acronym = HashMap::new();
        for (i, r) in records.iter_mut().enumerate() {
            if r.parent_id.is_none() && r.structure_id_path.len() >= 2 {
                r.parent_id = Some(r.structure_id_path[r.structure_id_path.len() - 2]);
            }
            if by_id.insert(r.id, i).is_some() {
                return Err(BrainrenderError::invalid(format!("duplicate structure id {}", r.id)));
            }
            if by_acronym.insert(r.acronym.clone(), i).is_some() {
                return Err(BrainrenderError::invalid(format!("duplicate acronym '{}'", r.acronym)));
            }
        }

        let mut children = vec![Vec::new(); records.len()];
        let mut roots = Vec::new();
        for (i, r) in records.iter().enumerate() {
            match r.parent_id {
                Some(p) => {
                    let &parent = by_id.get(&p).ok_or_else(|| {
                        BrainrenderError::invalid(format!("structure '{}' has unknown parent {p}", r.acronym))
                    })?;
                    children[parent].push(i);
                }
                None => roots.push(i),
            }
        }
        let [root] = roots.as_slice() else {
            return Err(BrainrenderError::invalid(format!(
                "atlas hierarchy must have one root, found {}",
                roots.len()
            )));
        };
        let mut hierarchy = Self {
            records,
            by_id,
            by_acronym,
            children,
            root: *root,
        };
        hierarchy.fill_paths()?;
        Ok(hierarchy)
    }

    fn fill_paths(&mut self) -> Result<()> {
        let mut stack = vec![(self.root, vec![self.records[self.root].id])];
        let mut reached = 0;
        while let Some((i, path)) = stack.pop() {
            reached += 1;
            for &c in &self.children[i] {
                let mut child_path = path.clone();
                child_path.push(self.records[c].id);
                stack.push((c, child_path));
            }
            self.records[i].structure_id_path = path;
        }
        if reached != self.records.len() {
            return Err(BrainrenderError::invalid("atlas hierarchy contains a cycle"));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn root(&self) -> &StructureRecord {
        &self.records[self.root]
    }

    pub fn get(&self, acronym: &str) -> Option<&StructureRecord> {
        self.by_acronym.get(acronym).map(|&i| &self.records[i])
    }

    pub fn get_by_id(&self, id: u32) -> Option<&StructureRecord> {
        self.by_id.get(&id).map(|&i| &self.records[i])
    }

    pub fn contains(&self, acronym: &str) -> bool {
        self.by_acronym.contains_key(acronym)
    }

    fn index(&self, acronym: &str) -> Result<usize> {
        self.by_acronym
            .get(acronym)
            .copied()
            .ok_or_else(|| BrainrenderError::invalid(format!("unknown acronym '{acronym}'")))
    }

    /// Like [`Hierarchy::get`], failing for unknown acronyms.
    pub fn require(&self, acronym: &str) -> Result<&StructureRecord> {
        Ok(&self.records[self.index(acronym)?])
    }

    pub fn parent(&self, acronym: &str) -> Result<Option<&StructureRecord>> {
        Ok(self.require(acronym)?.parent_id.and_then(|p| self.get_by_id(p)))
    }

    pub fn children(&self, acronym: &str) -> Result<Vec<&StructureRecord>> {
        let i = self.index(acronym)?;
        Ok(self.children[i].iter().map(|&c| &self.records[c]).collect())
    }

    /// Every structure below `acronym`, depth first.
    pub fn descendants(&self, acronym: &str) -> Result<Vec<&StructureRecord>> {
        let start = self.index(acronym)?;
        let mut out = Vec::new();
        let mut stack: Vec<usize> = self.children[start].iter().rev().copied().collect();
        while let Some(i) = stack.pop() {
            out.push(&self.records[i]);
            stack.extend(self.children[i].iter().rev());
        }
        Ok(out)
    }

    /// Structures from the root down to, but excluding, `acronym`.
    pub fn ancestors(&self, acronym: &str) -> Result<Vec<&StructureRecord>> {
        let record = self.require(acronym)?;
        let path = &record.structure_id_path;
        Ok(path[..path.len().saturating_sub(1)]
            .iter()
            .filter_map(|&id| self.get_by_id(id))
            .collect())
    }

    /// `(id, acronym, name)` of every structure, in file order.
    pub fn lookup(&self) -> Vec<(u32, &str, &str)> {
        self.records
            .iter()
            .map(|r| (r.id, r.acronym.as_str(), r.name.as_str()))
            .collect()
    }

    pub fn records(&self) -> &[StructureRecord] {
        &self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u32, acronym: &str, parent: Option<u32>) -> StructureRecord {
        StructureRecord {
            id,
            acronym: acronym.to_string(),
            name: acronym.to_lowercase(),
            rgb_triplet: [128, 128, 128],
            parent_id: parent,
            structure_id_path: Vec::new(),
        }
    }

    fn tree() -> Hierarchy {
        Hierarchy::new(vec![
            record(997, "root", None),
            record(8, "grey", Some(997)),
            record(549, "TH", Some(8)),
            record(688, "CTX", Some(8)),
            record(993, "MOs", Some(688)),
        ])
        .expect("valid tree")
    }

    #[test]
    fn test_lookups() {
        let h = tree();
        assert_eq!(h.root().acronym, "root");
        assert_eq!(h.get("TH").map(|r| r.id), Some(549));
        assert_eq!(h.get_by_id(993).map(|r| r.acronym.as_str()), Some("MOs"));
        assert!(h.get("XYZ").is_none());
        assert!(matches!(h.require("XYZ"), Err(BrainrenderError::InvalidInput(_))));
        assert_eq!(h.get("MOs").map(|r| r.structure_id_path.clone()), Some(vec![997, 8, 688, 993]));
    }

    #[test]
    fn test_relations() {
        let h = tree();
        assert_eq!(h.parent("MOs").expect("known").map(|r| r.acronym.as_str()), Some("CTX"));
        assert!(h.parent("root").expect("known").is_none());
        let children: Vec<_> = h.children("grey").expect("known").iter().map(|r| r.id).collect();
        assert_eq!(children, vec![549, 688]);
        let below: Vec<_> = h.descendants("grey").expect("known").iter().map(|r| r.acronym.clone()).collect();
        assert_eq!(below, vec!["TH", "CTX", "MOs"]);
        let above: Vec<_> = h.ancestors("MOs").expect("known").iter().map(|r| r.id).collect();
        assert_eq!(above, vec![997, 8, 688]);
    }

    #[test]
    fn test_parent_from_path() {
        let mut th = record(549, "TH", None);
        th.structure_id_path = vec![997, 549];
        let h = Hierarchy::new(vec![record(997, "root", None), th]).expect("valid");
        assert_eq!(h.get("TH").and_then(|r| r.parent_id), Some(997));
    }

    #[test]
    fn test_invalid_trees() {
        assert!(Hierarchy::new(Vec::new()).is_err());
        assert!(Hierarchy::new(vec![record(1, "a", None), record(2, "b", None)]).is_err());
        assert!(Hierarchy::new(vec![record(1, "a", None), record(1, "b", Some(1))]).is_err());
        assert!(Hierarchy::new(vec![record(1, "a", None), record(2, "b", Some(5))]).is_err());
        assert!(Hierarchy::new(vec![
            record(1, "a", None),
            record(2, "b", Some(3)),
            record(3, "c", Some(2))
        ])
        .is_err());
    }
}
