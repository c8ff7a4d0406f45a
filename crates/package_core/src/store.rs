use shared::domain::{Package, PackageId};

/// Canonical ordered collection of installed packages.
#[derive(Debug, Default, Clone)]
pub struct PackageStore {
    packages: Vec<Package>,
}

impl PackageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.packages.clear();
    }

    /// Appends `package` unless an entry with the same id is already held.
    pub fn add(&mut self, package: Package) -> bool {
        if self.find(&package.id).is_some() {
            return false;
        }
        self.packages.push(package);
        true
    }

    /// Removes the first entry matching `id`. Absent ids are ignored.
    pub fn remove(&mut self, id: &PackageId) -> Option<Package> {
        let idx = self.packages.iter().position(|pkg| &pkg.id == id)?;
        Some(self.packages.remove(idx))
    }

    pub fn find(&self, id: &PackageId) -> Option<&Package> {
        self.packages.iter().find(|pkg| &pkg.id == id)
    }

    pub fn find_mut(&mut self, id: &PackageId) -> Option<&mut Package> {
        self.packages.iter_mut().find(|pkg| &pkg.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Package> {
        self.packages.iter()
    }

    pub fn snapshot(&self) -> Vec<Package> {
        self.packages.clone()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package(id: &str) -> Package {
        Package::new(id, "1.0".parse().expect("version"))
    }

    fn ids(store: &PackageStore) -> Vec<String> {
        store.iter().map(|pkg| pkg.id.to_string()).collect()
    }

    #[test]
    fn keeps_insertion_order_and_rejects_duplicate_ids() {
        let mut store = PackageStore::new();
        assert!(store.add(package("b")));
        assert!(store.add(package("a")));
        assert!(!store.add(package("B")));
        assert_eq!(ids(&store), ["b", "a"]);
    }

    #[test]
    fn remove_takes_the_matching_entry_and_ignores_unknown_ids() {
        let mut store = PackageStore::new();
        store.add(package("a"));
        store.add(package("b"));

        let removed = store.remove(&PackageId::new("B")).expect("removed");
        assert_eq!(removed.id.as_str(), "b");
        assert!(store.remove(&PackageId::new("zzz")).is_none());
        assert_eq!(ids(&store), ["a"]);
    }

    #[test]
    fn lookups_ignore_case() {
        let mut store = PackageStore::new();
        store.add(package("NodeJS"));
        assert!(store.find(&PackageId::new("nodejs")).is_some());

        store.clear();
        assert!(store.is_empty());
    }
}
