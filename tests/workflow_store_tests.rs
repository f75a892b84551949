//! sled-backed workflow persistence

#[cfg(test)]
mod workflow_store_tests {
    use solana_sdk::pubkey::Pubkey;
    use tempfile::TempDir;

    use solflow::workflow::{ActionRecord, SledWorkflowStore, Workflow, WorkflowStore};

    fn sample(id: &str) -> Workflow {
        let mut workflow = Workflow::new(id, format!("{} workflow", id));
        workflow.actions.push(
            ActionRecord::new("pay", "transferNode", 1)
                .with_arg("address", Pubkey::new_unique().to_string())
                .with_arg("amount", "250000"),
        );
        workflow
    }

    #[test]
    fn test_save_load_list_remove() {
        let dir = TempDir::new().unwrap();
        let store = SledWorkflowStore::open(dir.path().join("store")).unwrap();

        assert!(store.list().unwrap().is_empty());
        assert_eq!(store.load("missing").unwrap(), None);

        let beta = sample("beta");
        let alpha = sample("alpha");
        store.save("beta", &beta).unwrap();
        store.save("alpha", &alpha).unwrap();

        assert_eq!(store.list().unwrap(), vec!["alpha", "beta"]);
        assert_eq!(store.load("beta").unwrap(), Some(beta));

        assert!(store.remove("alpha").unwrap());
        assert!(!store.remove("alpha").unwrap());
        assert_eq!(store.list().unwrap(), vec!["beta"]);
    }

    #[test]
    fn test_save_overwrites_existing_key() {
        let dir = TempDir::new().unwrap();
        let store = SledWorkflowStore::open(dir.path().join("store")).unwrap();

        let mut workflow = sample("wf");
        store.save("wf", &workflow).unwrap();
        workflow.name = "Renamed".to_string();
        workflow.actions.clear();
        store.save("wf", &workflow).unwrap();

        let loaded = store.load("wf").unwrap().unwrap();
        assert_eq!(loaded.name, "Renamed");
        assert!(loaded.actions.is_empty());
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_workflows_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store");
        let workflow = sample("persisted");

        {
            let store = SledWorkflowStore::open(&path).unwrap();
            store.save("persisted", &workflow).unwrap();
        }

        let reopened = SledWorkflowStore::open(&path).unwrap();
        assert_eq!(reopened.load("persisted").unwrap(), Some(workflow));
    }
}
