//! End-to-end project scans over a temporary directory tree.

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use crate::conflicts::ConflictKind;
    use crate::discovery::scan_project;
    use crate::error::{ScanError, ERR_ROUTE_CONFLICT, ERR_UNSUPPORTED_ROUTER_METHOD};
    use crate::options::{ScanMode, ScanOptions};

    fn write(root: &Path, filename: &str, contents: &str) {
        let path = root.join(filename);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create dirs");
        }
        fs::write(path, contents).expect("write file");
    }

    fn router(body: &str) -> String {
        format!(
            "import {{ createRouter }} from '@agentuity/runtime';\nconst router = createRouter();\n{}export default router;\n",
            body
        )
    }

    fn project(root: &Path) {
        write(root, "src/api/index.ts", &router("router.get('/', h);\n"));
        write(
            root,
            "src/api/orders/index.ts",
            &router("router.get('/:id', h);\nrouter.post('/items', h);\n"),
        );
        write(root, "src/api/orders/types.d.ts", "export type Order = { id: string };\n");
        write(root, "src/api/shared/schema.ts", "export const Item = {};\n");
        write(
            root,
            "src/agent/support/agent.ts",
            "import { createAgent } from '@agentuity/runtime';\nexport default createAgent('support', { handler: async () => 'ok' });\n",
        );
        write(
            root,
            "src/agent/support/eval.ts",
            "import agent from './agent';\nexport const tone = agent.createEval('tone', {});\n",
        );
    }

    #[test]
    fn test_scan_collects_sorted_records() {
        let dir = tempfile::tempdir().expect("tempdir");
        project(dir.path());
        let options = ScanOptions::new(dir.path()).with_project("proj", "dep");

        let scan = scan_project(&options).expect("scan");
        let paths: Vec<&str> = scan.routes.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["/api", "/api/orders/:id", "/api/orders/items"]);
        assert!(scan.conflicts.is_empty());
        assert!(scan.errors.is_empty());

        assert_eq!(scan.agents.len(), 1, "eval files are not agents");
        let agent = &scan.agents[0];
        assert_eq!(agent.record.filename, "src/agent/support/agent.ts");
        let evals = agent.record.evals.as_ref().expect("sibling evals");
        assert_eq!(evals[0].agent_identifier.as_deref(), Some(agent.record.agent_id.as_str()));

        let again = scan_project(&options).expect("scan");
        assert_eq!(again.routes, scan.routes);
        assert_eq!(again.agents, scan.agents);
    }

    #[test]
    fn test_duplicate_route_fails_production_scan() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "src/api/a.ts", &router("router.get('/users', h);\n"));
        write(dir.path(), "src/api/b.ts", &router("router.get('/users', h);\n"));

        let err = scan_project(&ScanOptions::new(dir.path())).unwrap_err();
        match err {
            ScanError::RouteConflict { conflicts } => {
                assert_eq!(conflicts.len(), 1);
                assert_eq!(conflicts[0].kind, ConflictKind::Duplicate);
                let files: Vec<&str> = conflicts[0].routes.iter().map(|r| r.filename.as_str()).collect();
                assert_eq!(files, vec!["src/api/a.ts", "src/api/b.ts"]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_development_scan_reports_and_continues() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "src/api/a.ts", &router("router.get('/users/:id', h);\n"));
        write(dir.path(), "src/api/b.ts", &router("router.get('/users/:userId', h);\n"));
        write(dir.path(), "src/api/c.ts", &router("router.trace('/x', h);\n"));

        let options = ScanOptions::new(dir.path()).with_mode(ScanMode::Development);
        let scan = scan_project(&options).expect("development scans do not fail");
        assert_eq!(scan.routes.len(), 2);
        assert_eq!(scan.conflicts.len(), 1);
        assert_eq!(scan.conflicts[0].kind, ConflictKind::AmbiguousParam);

        let codes: Vec<&str> = scan.errors.iter().map(|e| e.code).collect();
        assert_eq!(codes, vec![ERR_UNSUPPORTED_ROUTER_METHOD, ERR_ROUTE_CONFLICT]);
        assert_eq!(scan.errors[0].filename.as_deref(), Some("src/api/c.ts"));
        assert_eq!(scan.errors[0].line, Some(3));
    }

    #[test]
    fn test_production_scan_stops_at_first_file_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "src/api/a.ts", &router("router.cron('not-a-cron', h);\n"));
        write(dir.path(), "src/api/b.ts", &router("router.trace('/x', h);\n"));

        let err = scan_project(&ScanOptions::new(dir.path())).unwrap_err();
        assert_eq!(err.filename(), Some("src/api/a.ts"));
        assert!(matches!(err, ScanError::InvalidRouterArgument { .. }), "got: {:?}", err);
    }

    #[test]
    fn test_custom_roots() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "app/routes/v1/index.ts", &router("router.get('/ping', h);\n"));
        let options = ScanOptions::new(dir.path()).with_api_dir("app/routes").with_agent_dir("app/agents");
        let scan = scan_project(&options).expect("scan");
        assert_eq!(scan.routes.len(), 1);
        assert_eq!(scan.routes[0].path, "/api/v1/ping");
        assert_eq!(scan.routes[0].filename, "app/routes/v1/index.ts");
    }
}
