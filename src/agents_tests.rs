//! Agent extraction scenarios: metadata augmentation, schema text, stable
//! identity, and the sibling evals file.

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use crate::agents::extract_agent;
    use crate::error::ScanError;
    use crate::hash::{stable_agent_id, stable_eval_id};
    use crate::options::ScanOptions;
    use crate::parse::parse_module;

    const AGENT_SRC: &str = r#"import { createAgent } from '@agentuity/runtime';
import { z } from 'zod';

// Support agent
const agent = createAgent('support', {
  metadata: { name: 'Support Desk', description: 'Answers tickets' },
  schema: {
    input: z.object({ question: z.string() }),
    output: z.string(),
  },
  handler: async (ctx, input) => input.question,
});

export default agent;
"#;

    fn write(root: &Path, filename: &str, contents: &str) {
        let path = root.join(filename);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create dirs");
        }
        fs::write(path, contents).expect("write file");
    }

    fn reparses(code: &str, filename: &str) -> bool {
        let allocator = oxc_allocator::Allocator::default();
        parse_module(&allocator, code, filename).diagnostics == 0
    }

    #[test]
    fn test_existing_metadata_is_augmented() {
        let dir = tempfile::tempdir().expect("tempdir");
        let options = ScanOptions::new(dir.path()).with_project("proj", "dep");
        let out = extract_agent(AGENT_SRC, "src/agent/support/agent.ts", &options)
            .expect("agent")
            .expect("agent file");

        // The declared metadata name wins over the factory argument.
        assert_eq!(out.record.name, "Support Desk");
        assert_eq!(out.record.agent_id, stable_agent_id("proj", "Support Desk"));
        assert_eq!(out.record.description.as_deref(), Some("Answers tickets"));

        let input = out.record.input_schema_code.as_deref().expect("input schema");
        assert!(input.starts_with("z.object("), "got: {}", input);
        assert!(input.contains("question"), "got: {}", input);
        assert_eq!(out.record.output_schema_code.as_deref(), Some("z.string()"));

        assert!(out.code.contains("// Support agent"), "untouched text must survive");
        assert!(out.code.ends_with("export default agent;\n"));
        assert!(out.code.contains(&out.record.id));
        assert!(out.code.contains("inputSchemaCode"));
        assert_eq!(out.code.matches("metadata").count(), 1, "got: {}", out.code);
        assert!(reparses(&out.code, "agent.ts"), "regenerated code must parse: {}", out.code);
    }

    #[test]
    fn test_agent_id_survives_edits_but_version_does_not() {
        let dir = tempfile::tempdir().expect("tempdir");
        let options = ScanOptions::new(dir.path()).with_project("proj", "dep");
        let edited = AGENT_SRC.replace("input.question", "input.question.trim()");
        let a = extract_agent(AGENT_SRC, "src/agent/support/agent.ts", &options)
            .expect("agent")
            .expect("agent file");
        let b = extract_agent(&edited, "src/agent/support/agent.ts", &options)
            .expect("agent")
            .expect("agent file");
        assert_eq!(a.record.agent_id, b.record.agent_id);
        assert_ne!(a.record.version, b.record.version);
        assert_ne!(a.record.id, b.record.id);
    }

    #[test]
    fn test_sibling_evals_receive_agent_id() {
        let dir = tempfile::tempdir().expect("tempdir");
        let options = ScanOptions::new(dir.path()).with_project("proj", "dep");
        write(
            dir.path(),
            "src/agent/support/eval.ts",
            "import agent from './agent';\nexport const tone = agent.createEval('tone', { description: 'Polite tone' });\n",
        );

        let out = extract_agent(AGENT_SRC, "src/agent/support/agent.ts", &options)
            .expect("agent")
            .expect("agent file");
        let sibling = out.evals.as_ref().expect("sibling evals");
        assert_eq!(sibling.filename, "src/agent/support/eval.ts");
        assert_eq!(sibling.transform.evals.len(), 1);

        let eval = &sibling.transform.evals[0];
        assert_eq!(eval.agent_identifier.as_deref(), Some(out.record.agent_id.as_str()));
        assert_eq!(eval.identifier, stable_eval_id("proj", &out.record.agent_id, "tone"));
        assert!(sibling.transform.code.contains(&out.record.agent_id));

        let evals_json = out.metadata.get("evals").expect("evals in metadata");
        let parsed: serde_json::Value = serde_json::from_str(evals_json).expect("evals json");
        assert_eq!(parsed[0]["name"], "tone");
        assert_eq!(parsed[0]["description"], "Polite tone");
        assert_eq!(out.record.evals.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn test_sibling_eval_errors_propagate() {
        let dir = tempfile::tempdir().expect("tempdir");
        let options = ScanOptions::new(dir.path());
        write(
            dir.path(),
            "src/agent/support/evals.ts",
            "import agent from './agent';\nexport const a = agent.createEval('x', {});\nexport const b = agent.createEval('x', {});\n",
        );
        let err = extract_agent(AGENT_SRC, "src/agent/support/agent.ts", &options).unwrap_err();
        assert!(matches!(err, ScanError::DuplicateEvalName { ref filename, .. } if filename == "src/agent/support/evals.ts"));
    }

    #[test]
    fn test_default_export_must_be_factory_call() {
        let src = "import { createAgent } from '@agentuity/runtime';\nexport default function handler() {}\n";
        let err = extract_agent(src, "src/agent/x/agent.ts", &ScanOptions::default()).unwrap_err();
        assert!(matches!(err, ScanError::InvalidAgentDeclaration { line: 2, .. }), "got: {:?}", err);

        let src = "import { createAgent } from '@agentuity/runtime';\nexport default createAgent(name, {});\n";
        let err = extract_agent(src, "src/agent/x/agent.ts", &ScanOptions::default()).unwrap_err();
        assert!(err.to_string().contains("string literal"), "got: {}", err);
    }
}
