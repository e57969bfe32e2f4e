//! Pure rendering of template + state into HTML

use crate::schema::TemplateSchema;
use crate::state::TemplateState;

const MAIN_CLOSE: &str = "</main>";

/// Merge `state` into `original`.
///
/// Placeholders are replaced literally, longest first (ties by section
/// name), so a placeholder that contains another one is substituted
/// before its substring. Dynamic sections go right before the last
/// `</main>`; a template without one gets none.
pub fn render_document(original: &str, schema: &TemplateSchema, state: &TemplateState) -> String {
    let mut sections: Vec<(&String, &str, &str)> = schema
        .iter()
        .filter(|(name, spec)| {
            !spec.contenu.is_empty() && !state.removed_sections.contains(name.as_str())
        })
        .map(|(name, spec)| {
            let value = state
                .filled_data
                .get(name.as_str())
                .map(String::as_str)
                .unwrap_or(spec.contenu_initiale.as_str());
            (name, spec.contenu.as_str(), value)
        })
        .collect();
    sections.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then_with(|| a.0.cmp(b.0)));

    let mut html = original.to_string();
    for (_, placeholder, value) in sections {
        html = html.replace(placeholder, value);
    }

    if state.dynamic_sections.is_empty() {
        return html;
    }
    let Some(idx) = html.rfind(MAIN_CLOSE) else {
        return html;
    };

    let mut blocks = String::new();
    for (key, section) in &state.dynamic_sections {
        if state.removed_sections.contains(key) {
            continue;
        }
        blocks.push_str(&format!(
            "\n<section id='{}' class='section'>\n  <h2>{}</h2>\n  <div class='content'>{}</div>\n</section>\n",
            key, section.titre, section.contenu
        ));
    }

    html.insert_str(idx, &blocks);
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SectionSpec;
    use crate::state::DynamicSection;

    fn spec(placeholder: &str, initial: &str) -> SectionSpec {
        SectionSpec {
            contenu_initiale: initial.to_string(),
            contenu: placeholder.to_string(),
            ia_prompt: String::new(),
        }
    }

    fn dynamic(titre: &str, contenu: &str) -> DynamicSection {
        DynamicSection {
            titre: titre.to_string(),
            contenu: contenu.to_string(),
        }
    }

    #[test]
    fn test_fallback_then_filled() {
        let schema: TemplateSchema = [("budget".to_string(), spec("{{budget}}", "TBD"))]
            .into_iter()
            .collect();
        let original = "<main><p>{{budget}}</p></main>";

        let mut state = TemplateState::default();
        assert_eq!(
            render_document(original, &schema, &state),
            "<main><p>TBD</p></main>"
        );

        state.filled_data.insert("budget".into(), "<p>Hello</p>".into());
        assert_eq!(
            render_document(original, &schema, &state),
            "<main><p><p>Hello</p></p></main>"
        );
    }

    #[test]
    fn test_every_occurrence_replaced() {
        let schema: TemplateSchema = [("client".to_string(), spec("[CLIENT]", ""))]
            .into_iter()
            .collect();
        let mut state = TemplateState::default();
        state.filled_data.insert("client".into(), "ACME".into());

        assert_eq!(
            render_document("[CLIENT] and [CLIENT]", &schema, &state),
            "ACME and ACME"
        );
    }

    #[test]
    fn test_removed_section_keeps_placeholder() {
        let schema: TemplateSchema = [("annex".to_string(), spec("{{annex}}", "none"))]
            .into_iter()
            .collect();
        let mut state = TemplateState::default();
        state.removed_sections.insert("annex".into());

        assert_eq!(render_document("{{annex}}", &schema, &state), "{{annex}}");
    }

    #[test]
    fn test_empty_placeholder_ignored() {
        let schema: TemplateSchema = [("meta".to_string(), spec("", "x"))].into_iter().collect();
        assert_eq!(
            render_document("<main></main>", &schema, &TemplateState::default()),
            "<main></main>"
        );
    }

    #[test]
    fn test_longest_placeholder_first() {
        let schema: TemplateSchema = [
            ("short".to_string(), spec("{{plan}}", "S")),
            ("long".to_string(), spec("{{plan}}_detail", "L")),
        ]
        .into_iter()
        .collect();

        assert_eq!(
            render_document("{{plan}}_detail / {{plan}}", &schema, &TemplateState::default()),
            "L / S"
        );
    }

    #[test]
    fn test_replacement_is_literal() {
        let schema: TemplateSchema = [("price".to_string(), spec("$1.00 (x)", ""))]
            .into_iter()
            .collect();
        let mut state = TemplateState::default();
        state.filled_data.insert("price".into(), "$2 \\1".into());

        assert_eq!(render_document("cost: $1.00 (x)", &schema, &state), "cost: $2 \\1");
    }

    #[test]
    fn test_dynamic_sections_before_last_main() {
        let mut state = TemplateState::default();
        state
            .dynamic_sections
            .insert("budget_final".into(), dynamic("Budget Final", "<p>42</p>"));
        state
            .dynamic_sections
            .insert("annexe".into(), dynamic("Annexe", ""));

        let html = render_document(
            "<main>a</main><main>b</main>",
            &TemplateSchema::default(),
            &state,
        );
        assert_eq!(
            html,
            "<main>a</main><main>b\n<section id='budget_final' class='section'>\n  <h2>Budget Final</h2>\n  <div class='content'><p>42</p></div>\n</section>\n\n<section id='annexe' class='section'>\n  <h2>Annexe</h2>\n  <div class='content'></div>\n</section>\n</main>"
        );
    }

    #[test]
    fn test_no_main_no_dynamic_blocks() {
        let mut state = TemplateState::default();
        state
            .dynamic_sections
            .insert("extra".into(), dynamic("Extra", "x"));

        assert_eq!(
            render_document("<body></body>", &TemplateSchema::default(), &state),
            "<body></body>"
        );
    }

    #[test]
    fn test_removed_dynamic_section_skipped() {
        let mut state = TemplateState::default();
        state.dynamic_sections.insert("a".into(), dynamic("A", "1"));
        state.removed_sections.insert("a".into());

        assert_eq!(
            render_document("<main></main>", &TemplateSchema::default(), &state),
            "<main></main>"
        );
    }

    #[test]
    fn test_deterministic() {
        let schema: TemplateSchema = [
            ("a".to_string(), spec("{{a}}", "A")),
            ("b".to_string(), spec("{{b}}", "B")),
        ]
        .into_iter()
        .collect();
        let mut state = TemplateState::default();
        state.dynamic_sections.insert("x".into(), dynamic("X", "x"));

        let original = "<main>{{a}}{{b}}</main>";
        assert_eq!(
            render_document(original, &schema, &state),
            render_document(original, &schema, &state)
        );
    }
}
