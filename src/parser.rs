mod literal;

use std::fs;
use std::path::Path;

use color_eyre::eyre::{self, Context};

use crate::stage::{CompositionArc, Prim, Relationship, Specifier, Stage, UpAxis, VariantSet};
use crate::tokenizer::{Token, TokenKind, tokenize};
use crate::value::Value;

pub use literal::ScalarType;

// only the file read itself can fail; malformed content degrades to a
// partially populated stage
pub fn parse_stage_file(path: &Path) -> eyre::Result<Stage> {
    let text = fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read stage: {}", path.display()))?;
    Ok(parse_stage_text(&text, path))
}

pub fn parse_stage_text(text: &str, source_path: &Path) -> Stage {
    StageParser::new(text, source_path).parse()
}

struct StageParser {
    tokens: Vec<Token>,
    pos: usize,
    stage: Stage,
}

impl StageParser {
    fn new(text: &str, source_path: &Path) -> Self {
        Self {
            tokens: tokenize(text),
            pos: 0,
            stage: Stage::new(source_path),
        }
    }

    fn parse(mut self) -> Stage {
        // The header line is a comment and never reaches us. Stage
        // metadata, when present, is the first token.
        if self.peek() == &TokenKind::LeftParen {
            self.parse_stage_metadata();
        }

        loop {
            match self.peek() {
                TokenKind::Eof => break,
                TokenKind::Identifier(word) if is_specifier(word) => {
                    if let Some(id) = self.parse_prim(None, "") {
                        self.stage.roots.push(id);
                    }
                }
                _ => {
                    self.advance();
                }
            }
        }

        self.stage
    }

    // ---- cursor ----

    fn peek(&self) -> &TokenKind {
        self.tokens
            .get(self.pos)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    fn peek_at(&self, offset: usize) -> &TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self
            .tokens
            .get(self.pos)
            .map(|t| t.kind.clone())
            .unwrap_or(TokenKind::Eof);
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_identifier(&mut self) -> Option<String> {
        match self.peek() {
            TokenKind::Identifier(_) => match self.advance() {
                TokenKind::Identifier(word) => Some(word),
                _ => unreachable!(),
            },
            _ => None,
        }
    }

    fn eat_string(&mut self) -> Option<String> {
        match self.peek() {
            TokenKind::Str(_) => match self.advance() {
                TokenKind::Str(text) => Some(text),
                _ => unreachable!(),
            },
            _ => None,
        }
    }

    // ---- stage metadata ----

    fn parse_stage_metadata(&mut self) {
        self.advance(); // '('
        loop {
            match self.peek().clone() {
                TokenKind::RightParen => {
                    self.advance();
                    return;
                }
                TokenKind::Eof => return,
                TokenKind::Str(text) => {
                    // bare string is the layer documentation
                    self.advance();
                    self.stage.documentation = Some(text);
                }
                TokenKind::Identifier(key) => {
                    self.advance();
                    self.parse_stage_metadata_entry(&key);
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn parse_stage_metadata_entry(&mut self, key: &str) {
        if !self.eat(&TokenKind::Equals) {
            return;
        }
        match key {
            "defaultPrim" => {
                if let Some(name) = self.eat_string() {
                    self.stage.default_prim = Some(name);
                }
            }
            "upAxis" => {
                if let Some(axis) = self.eat_string() {
                    match axis.as_str() {
                        "Z" => self.stage.up_axis = UpAxis::Z,
                        _ => self.stage.up_axis = UpAxis::Y,
                    }
                }
            }
            "metersPerUnit" => {
                if let Some(v) = self.eat_number() {
                    self.stage.meters_per_unit = v;
                }
            }
            "timeCodesPerSecond" => self.stage.time_codes_per_second = self.eat_number(),
            "framesPerSecond" => self.stage.frames_per_second = self.eat_number(),
            "startTimeCode" => self.stage.start_time_code = self.eat_number(),
            "endTimeCode" => self.stage.end_time_code = self.eat_number(),
            "subLayers" => {
                for layer in self.parse_string_or_asset_list() {
                    self.stage.sub_layers.push(layer);
                }
            }
            "doc" => {
                if let Some(text) = self.eat_string() {
                    self.stage.documentation = Some(text);
                }
            }
            _ => self.skip_balanced_value(),
        }
    }

    // ---- prims ----

    fn parse_prim(&mut self, parent: Option<usize>, parent_path: &str) -> Option<usize> {
        let specifier = match self.eat_identifier().as_deref() {
            Some("def") => Specifier::Def,
            Some("over") => Specifier::Over,
            Some("class") => Specifier::Class,
            _ => return None,
        };

        let mut type_name = String::new();
        if let TokenKind::Identifier(_) = self.peek() {
            type_name = self.eat_identifier().unwrap_or_default();
        }

        let Some(name) = self.eat_string() else {
            // malformed prim head, resynchronize on its body if present
            if self.peek() == &TokenKind::LeftBrace {
                self.advance();
                self.skip_balanced(TokenKind::LeftBrace);
            }
            return None;
        };

        let path = format!("{parent_path}/{name}");
        let mut prim = Prim::new(&name, &path, specifier);
        prim.type_name = type_name;
        prim.parent = parent;
        let id = self.stage.alloc_prim(prim);
        self.stage.register_path(id);
        if let Some(parent_id) = parent {
            self.stage.prim_mut(parent_id).children.push(id);
        }

        if self.peek() == &TokenKind::LeftParen {
            self.advance();
            self.parse_prim_metadata(id);
        }

        if self.eat(&TokenKind::LeftBrace) {
            self.parse_prim_body(id, &path);
        }

        Some(id)
    }

    fn parse_prim_metadata(&mut self, id: usize) {
        loop {
            match self.peek().clone() {
                TokenKind::RightParen => {
                    self.advance();
                    return;
                }
                TokenKind::Eof => return,
                TokenKind::Str(text) => {
                    self.advance();
                    self.stage
                        .prim_mut(id)
                        .metadata
                        .insert("doc".to_string(), Value::String(text));
                }
                TokenKind::Identifier(key) => {
                    self.advance();
                    // prepend/append do not alter semantics here;
                    // delete edits are dropped wholesale
                    if key == "delete" {
                        let _ = self.eat_identifier();
                        if self.eat(&TokenKind::Equals) {
                            self.skip_balanced_value();
                        }
                        continue;
                    }
                    let key = if key == "prepend" || key == "append" {
                        match self.eat_identifier() {
                            Some(real) => real,
                            None => continue,
                        }
                    } else {
                        key
                    };
                    self.parse_prim_metadata_entry(id, &key);
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn parse_prim_metadata_entry(&mut self, id: usize, key: &str) {
        match key {
            "references" => {
                if self.eat(&TokenKind::Equals) {
                    let arcs = self.parse_arc_list();
                    self.stage.prim_mut(id).references.extend(arcs);
                }
            }
            "payload" | "payloads" => {
                if self.eat(&TokenKind::Equals) {
                    let arcs = self.parse_arc_list();
                    self.stage.prim_mut(id).payloads.extend(arcs);
                }
            }
            "inherits" => {
                if self.eat(&TokenKind::Equals) {
                    let paths = self.parse_prim_path_list();
                    self.stage.prim_mut(id).inherits.extend(paths);
                }
            }
            "apiSchemas" => {
                if self.eat(&TokenKind::Equals) {
                    let names = self.parse_string_or_asset_list();
                    self.stage.prim_mut(id).api_schemas.extend(names);
                }
            }
            "kind" => {
                if self.eat(&TokenKind::Equals)
                    && let Some(kind) = self.eat_string()
                {
                    self.stage
                        .prim_mut(id)
                        .metadata
                        .insert("kind".to_string(), Value::Token(kind));
                }
            }
            "instanceable" => {
                if self.eat(&TokenKind::Equals)
                    && let Some(word) = self.eat_identifier()
                {
                    self.stage
                        .prim_mut(id)
                        .metadata
                        .insert("instanceable".to_string(), Value::Bool(word == "true"));
                }
            }
            "variants" => {
                if self.eat(&TokenKind::Equals) {
                    self.parse_variant_selections(id);
                }
            }
            "variantSets" => {
                // declaration only, the sets themselves live in the body
                if self.eat(&TokenKind::Equals) {
                    let _ = self.parse_string_or_asset_list();
                }
            }
            "customData" => {
                if self.eat(&TokenKind::Equals) {
                    self.skip_balanced_value();
                }
            }
            "doc" => {
                if self.eat(&TokenKind::Equals)
                    && let Some(text) = self.eat_string()
                {
                    self.stage
                        .prim_mut(id)
                        .metadata
                        .insert("doc".to_string(), Value::String(text));
                }
            }
            _ => {
                if self.eat(&TokenKind::Equals) {
                    self.skip_balanced_value();
                }
            }
        }
    }

    // `{ type name = "value" ... }`
    fn parse_variant_selections(&mut self, id: usize) {
        if !self.eat(&TokenKind::LeftBrace) {
            self.skip_balanced_value();
            return;
        }
        loop {
            match self.peek().clone() {
                TokenKind::RightBrace => {
                    self.advance();
                    return;
                }
                TokenKind::Eof => return,
                TokenKind::Identifier(_) => {
                    // `string lod = "lod1"`, the set name is the last
                    // identifier before '='
                    let mut set_name = self.eat_identifier().unwrap_or_default();
                    while let TokenKind::Identifier(_) = self.peek() {
                        set_name = self.eat_identifier().unwrap_or_default();
                    }
                    if self.eat(&TokenKind::Equals)
                        && let Some(choice) = self.eat_string()
                    {
                        self.stage
                            .prim_mut(id)
                            .variant_selections
                            .insert(set_name, choice);
                    }
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn parse_prim_body(&mut self, id: usize, path: &str) {
        loop {
            match self.peek().clone() {
                TokenKind::RightBrace => {
                    self.advance();
                    return;
                }
                TokenKind::Eof => return,
                TokenKind::Identifier(word) if is_specifier(&word) => {
                    self.parse_prim(Some(id), path);
                }
                TokenKind::Identifier(word) if word == "variantSet" => {
                    self.advance();
                    self.parse_variant_set(id, path);
                }
                TokenKind::Identifier(_) => {
                    self.parse_property(id);
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    // `variantSet "name" = { "variant" ( meta ) { body } ... }`
    fn parse_variant_set(&mut self, owner: usize, owner_path: &str) {
        let Some(set_name) = self.eat_string() else {
            return;
        };
        if !self.eat(&TokenKind::Equals) || !self.eat(&TokenKind::LeftBrace) {
            return;
        }

        let mut set = VariantSet {
            name: set_name,
            variants: Vec::new(),
        };

        loop {
            match self.peek().clone() {
                TokenKind::RightBrace => {
                    self.advance();
                    break;
                }
                TokenKind::Eof => break,
                TokenKind::Str(variant_name) => {
                    self.advance();
                    // the carrier prim holds the variant's arcs and
                    // children; it is not addressable by path
                    let mut carrier = Prim::new(&variant_name, owner_path, Specifier::Def);
                    carrier.parent = Some(owner);
                    let carrier_id = self.stage.alloc_prim(carrier);

                    if self.peek() == &TokenKind::LeftParen {
                        self.advance();
                        self.parse_prim_metadata(carrier_id);
                    }
                    if self.eat(&TokenKind::LeftBrace) {
                        self.parse_prim_body(carrier_id, owner_path);
                    }
                    set.variants.push((variant_name, carrier_id));
                }
                _ => {
                    self.advance();
                }
            }
        }

        self.stage.prim_mut(owner).variant_sets.push(set);
    }

    fn parse_property(&mut self, id: usize) {
        // leading modifiers
        loop {
            match self.peek() {
                TokenKind::Identifier(word)
                    if word == "prepend"
                        || word == "append"
                        || word == "uniform"
                        || word == "custom"
                        || word == "varying" =>
                {
                    self.advance();
                }
                _ => break,
            }
        }

        let Some(first) = self.eat_identifier() else {
            self.advance();
            return;
        };

        if first == "rel" {
            self.parse_relationship(id);
            return;
        }

        // type name, optional [] array suffix
        let type_name = first;
        let mut is_array = false;
        if self.peek() == &TokenKind::LeftBracket && self.peek_at(1) == &TokenKind::RightBracket {
            self.advance();
            self.advance();
            is_array = true;
        }

        let Some(attr_name) = self.parse_namespaced_name() else {
            self.skip_statement();
            return;
        };

        if !self.eat(&TokenKind::Equals) {
            // declaration without a value; a metadata block may follow
            self.skip_optional_paren_block();
            return;
        }

        let value = match ScalarType::from_type_name(&type_name) {
            Some(scalar) => {
                let checkpoint = self.pos;
                match self.parse_typed_value(scalar, is_array) {
                    Some(v) => Some(v),
                    None => {
                        self.pos = checkpoint;
                        self.skip_balanced_value();
                        None
                    }
                }
            }
            None => {
                self.skip_balanced_value();
                None
            }
        };

        if let Some(value) = value {
            self.stage.prim_mut(id).attributes.insert(attr_name, value);
        }

        self.skip_optional_paren_block();
    }

    fn parse_relationship(&mut self, id: usize) {
        let Some(name) = self.parse_namespaced_name() else {
            self.skip_statement();
            return;
        };

        let mut targets = Vec::new();
        if self.eat(&TokenKind::Equals) {
            match self.peek().clone() {
                TokenKind::PrimPath(target) => {
                    self.advance();
                    targets.push(target);
                }
                TokenKind::LeftBracket => {
                    self.advance();
                    loop {
                        match self.peek().clone() {
                            TokenKind::RightBracket => {
                                self.advance();
                                break;
                            }
                            TokenKind::Eof => break,
                            TokenKind::PrimPath(target) => {
                                self.advance();
                                targets.push(target);
                            }
                            _ => {
                                self.advance();
                            }
                        }
                    }
                }
                _ => self.skip_balanced_value(),
            }
        }

        self.stage
            .prim_mut(id)
            .relationships
            .push(Relationship { name, targets });
        self.skip_optional_paren_block();
    }

    // `ident(:ident)*`
    fn parse_namespaced_name(&mut self) -> Option<String> {
        let mut name = self.eat_identifier()?;
        while self.peek() == &TokenKind::Colon {
            let TokenKind::Identifier(_) = self.peek_at(1) else {
                break;
            };
            self.advance();
            name.push(':');
            name.push_str(&self.eat_identifier().unwrap_or_default());
        }
        Some(name)
    }

    // ---- composition arc lists ----

    // single arc or bracketed list; each arc is an asset path with an
    // optional prim-path suffix
    fn parse_arc_list(&mut self) -> Vec<CompositionArc> {
        let mut arcs = Vec::new();
        match self.peek().clone() {
            TokenKind::AssetPath(_) => {
                if let Some(arc) = self.parse_single_arc() {
                    arcs.push(arc);
                }
            }
            TokenKind::LeftBracket => {
                self.advance();
                loop {
                    match self.peek().clone() {
                        TokenKind::RightBracket => {
                            self.advance();
                            break;
                        }
                        TokenKind::Eof => break,
                        TokenKind::AssetPath(_) => {
                            if let Some(arc) = self.parse_single_arc() {
                                arcs.push(arc);
                            }
                        }
                        _ => {
                            self.advance();
                        }
                    }
                }
            }
            _ => self.skip_balanced_value(),
        }
        arcs
    }

    fn parse_single_arc(&mut self) -> Option<CompositionArc> {
        let TokenKind::AssetPath(asset) = self.advance() else {
            return None;
        };
        let mut prim_path = None;
        if let TokenKind::PrimPath(_) = self.peek() {
            if let TokenKind::PrimPath(target) = self.advance() {
                prim_path = Some(target);
            }
        }
        // layer offsets etc. may trail in parens
        self.skip_optional_paren_block();
        Some(CompositionArc { asset, prim_path })
    }

    fn parse_prim_path_list(&mut self) -> Vec<String> {
        let mut paths = Vec::new();
        match self.peek().clone() {
            TokenKind::PrimPath(path) => {
                self.advance();
                paths.push(path);
            }
            TokenKind::LeftBracket => {
                self.advance();
                loop {
                    match self.peek().clone() {
                        TokenKind::RightBracket => {
                            self.advance();
                            break;
                        }
                        TokenKind::Eof => break,
                        TokenKind::PrimPath(path) => {
                            self.advance();
                            paths.push(path);
                        }
                        _ => {
                            self.advance();
                        }
                    }
                }
            }
            _ => self.skip_balanced_value(),
        }
        paths
    }

    fn parse_string_or_asset_list(&mut self) -> Vec<String> {
        let mut items = Vec::new();
        match self.peek().clone() {
            TokenKind::Str(text) | TokenKind::AssetPath(text) => {
                self.advance();
                items.push(text);
            }
            TokenKind::LeftBracket => {
                self.advance();
                loop {
                    match self.peek().clone() {
                        TokenKind::RightBracket => {
                            self.advance();
                            break;
                        }
                        TokenKind::Eof => break,
                        TokenKind::Str(text) | TokenKind::AssetPath(text) => {
                            self.advance();
                            items.push(text);
                        }
                        _ => {
                            self.advance();
                        }
                    }
                }
            }
            _ => self.skip_balanced_value(),
        }
        items
    }

    fn skip_optional_paren_block(&mut self) {
        if self.peek() == &TokenKind::LeftParen {
            self.advance();
            self.skip_balanced(TokenKind::LeftParen);
        }
    }

    // drop tokens until the next identifier-led statement or closing
    // brace at this depth
    fn skip_statement(&mut self) {
        loop {
            match self.peek() {
                TokenKind::Eof | TokenKind::RightBrace => return,
                TokenKind::Identifier(_) => return,
                TokenKind::LeftParen => {
                    self.advance();
                    self.skip_balanced(TokenKind::LeftParen);
                }
                TokenKind::LeftBracket => {
                    self.advance();
                    self.skip_balanced(TokenKind::LeftBracket);
                }
                TokenKind::LeftBrace => {
                    self.advance();
                    self.skip_balanced(TokenKind::LeftBrace);
                }
                _ => {
                    self.advance();
                }
            }
        }
    }
}

fn is_specifier(word: &str) -> bool {
    word == "def" || word == "over" || word == "class"
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn parse(text: &str) -> Stage {
        parse_stage_text(text, Path::new("test.usda"))
    }

    #[test]
    fn test_minimal_mesh_stage() {
        let stage = parse(
            r#"#usda 1.0
def Mesh "m" {
    point3f[] points = [(1,2,3)]
    int[] faceVertexCounts = [3]
    int[] faceVertexIndices = [0,0,0]
}
"#,
        );
        assert_eq!(stage.roots.len(), 1);
        let m = stage.prim_at_path("/m").unwrap();
        assert!(m.is_mesh());
        assert_eq!(m.points(), Some(&[Vec3::new(1.0, 2.0, 3.0)][..]));
        assert_eq!(m.face_vertex_counts(), Some(&[3][..]));
        assert_eq!(m.face_vertex_indices(), Some(&[0, 0, 0][..]));
    }

    #[test]
    fn test_stage_metadata() {
        let stage = parse(
            r#"#usda 1.0
(
    "scene description"
    defaultPrim = "World"
    upAxis = "Z"
    metersPerUnit = 1
    timeCodesPerSecond = 24
    subLayers = [@./base.usda@, @./set_dressing.usda@]
    unknownKey = (1, 2, 3)
)
def Xform "World" {}
"#,
        );
        assert_eq!(stage.documentation.as_deref(), Some("scene description"));
        assert_eq!(stage.default_prim.as_deref(), Some("World"));
        assert_eq!(stage.up_axis, UpAxis::Z);
        assert_eq!(stage.meters_per_unit, 1.0);
        assert_eq!(stage.time_codes_per_second, Some(24.0));
        assert_eq!(stage.sub_layers, vec!["./base.usda", "./set_dressing.usda"]);
        assert_eq!(stage.roots.len(), 1);
    }

    #[test]
    fn test_nested_prims_register_paths() {
        let stage = parse(
            r#"def Xform "a" {
    def Xform "b" {
        def Mesh "c" {}
    }
}
"#,
        );
        assert!(stage.prim_at_path("/a").is_some());
        assert!(stage.prim_at_path("/a/b").is_some());
        assert!(stage.prim_at_path("/a/b/c").unwrap().is_mesh());
        let b = stage.prim_at_path("/a/b").unwrap();
        assert_eq!(b.parent, stage.prim_id_at_path("/a"));
    }

    #[test]
    fn test_references_and_payloads() {
        let stage = parse(
            r#"def Xform "a" (
    prepend references = [@./crate.usda@</Root>, @./barrel.usda@]
    payload = @./heavy.usda@
) {}
"#,
        );
        let a = stage.prim_at_path("/a").unwrap();
        assert_eq!(a.references.len(), 2);
        assert_eq!(a.references[0].asset, "./crate.usda");
        assert_eq!(a.references[0].prim_path.as_deref(), Some("/Root"));
        assert_eq!(a.references[1].prim_path, None);
        assert_eq!(a.payloads.len(), 1);
        assert_eq!(a.payloads[0].asset, "./heavy.usda");
    }

    #[test]
    fn test_variant_set_and_selection() {
        let stage = parse(
            r#"def Xform "a" (
    variants = {
        string lod = "lod1"
    }
) {
    variantSet "lod" = {
        "lod0" {
            def Mesh "hi" {}
        }
        "lod1" (
            references = @./low.usda@
        ) {
            def Mesh "lo" {}
        }
    }
}
"#,
        );
        let a = stage.prim_at_path("/a").unwrap();
        assert_eq!(a.variant_selections.get("lod").map(String::as_str), Some("lod1"));
        assert_eq!(a.variant_sets.len(), 1);
        let set = &a.variant_sets[0];
        assert_eq!(set.name, "lod");
        assert_eq!(set.variants[0].0, "lod0");
        assert_eq!(set.variants[1].0, "lod1");

        let (_, lod1) = &set.variants[1];
        let carrier = stage.prim(*lod1);
        assert_eq!(carrier.references.len(), 1);
        assert_eq!(carrier.children.len(), 1);
        // variant children are addressable under the owner's path
        assert!(stage.prim_at_path("/a/lo").is_some());
    }

    #[test]
    fn test_relationships_kept_verbatim() {
        let stage = parse(
            r#"def Mesh "m" {
    rel skel:skeleton = </Rig/Skel>
    rel material:binding = [</Looks/A>, </Looks/B>]
}
"#,
        );
        let m = stage.prim_at_path("/m").unwrap();
        assert_eq!(m.skeleton_binding(), Some("/Rig/Skel"));
        assert_eq!(
            m.relationship("material:binding").unwrap().targets,
            vec!["/Looks/A", "/Looks/B"]
        );
    }

    #[test]
    fn test_unknown_type_omitted() {
        let stage = parse(
            r#"def Mesh "m" {
    wibble3h[] weird = [(1,2), (3,4)]
    int count = 7
}
"#,
        );
        let m = stage.prim_at_path("/m").unwrap();
        assert!(m.attr("weird").is_none());
        assert_eq!(m.attr("count").unwrap().as_int(), Some(7));
    }

    #[test]
    fn test_malformed_value_omitted_parsing_continues() {
        let stage = parse(
            r#"def Mesh "m" {
    float3 bad = (1, "oops", 3)
    float3 good = (1, 2, 3)
}
"#,
        );
        let m = stage.prim_at_path("/m").unwrap();
        assert!(m.attr("bad").is_none());
        assert_eq!(m.attr("good").unwrap().as_vec3(), Some(Vec3::new(1.0, 2.0, 3.0)));
    }

    #[test]
    fn test_attribute_metadata_block_skipped() {
        let stage = parse(
            r#"def Mesh "m" {
    texCoord2f[] primvars:st = [(0, 0), (1, 1)] (
        interpolation = "faceVarying"
    )
    int after = 1
}
"#,
        );
        let m = stage.prim_at_path("/m").unwrap();
        assert_eq!(m.attr("primvars:st").unwrap().as_vec2_array().map(|a| a.len()), Some(2));
        assert_eq!(m.attr("after").unwrap().as_int(), Some(1));
    }

    #[test]
    fn test_class_parses_as_definition() {
        let stage = parse(
            r#"class Xform "proto" {
    def Mesh "m" {}
}
"#,
        );
        let proto = stage.prim_at_path("/proto").unwrap();
        assert_eq!(proto.specifier, Specifier::Class);
        assert_eq!(proto.children.len(), 1);
    }

    #[test]
    fn test_inherits_and_api_schemas() {
        let stage = parse(
            r#"def Xform "a" (
    inherits = </classes/base>
    apiSchemas = ["SkelBindingAPI"]
    kind = "component"
    instanceable = true
    customData = { int priority = 3 }
) {}
"#,
        );
        let a = stage.prim_at_path("/a").unwrap();
        assert_eq!(a.inherits, vec!["/classes/base"]);
        assert_eq!(a.api_schemas, vec!["SkelBindingAPI"]);
        assert_eq!(a.metadata.get("kind").unwrap().as_token(), Some("component"));
        assert_eq!(a.metadata.get("instanceable").unwrap().as_bool(), Some(true));
    }
}
