//! Column categories and schema trees.
//!
//! A [`TypeDescription`] is a tree of column categories. Column ids are
//! assigned pre-order from zero at the root, so a parent's id is always
//! smaller than any descendant's; [`TypeDescription::flatten`] produces the
//! arena of id-indexed nodes the writer, reader and footer work with.
//!
//! Schemas can be built programmatically or parsed from the compact text
//! form, e.g. `struct<name:string,score:decimal(10,2),tags:array<string>>`.

use std::fmt;

use crate::error::{Error, Result};

/// The closed set of column categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Category {
    /// A true/false value.
    Boolean = 0,
    /// An 8-bit signed integer (`tinyint`).
    Byte = 1,
    /// A 16-bit signed integer (`smallint`).
    Short = 2,
    /// A 32-bit signed integer.
    Int = 3,
    /// A 64-bit signed integer (`bigint`).
    Long = 4,
    /// A 32-bit IEEE-754 float.
    Float = 5,
    /// A 64-bit IEEE-754 float.
    Double = 6,
    /// A UTF-8 string.
    String = 7,
    /// A fixed-length string.
    Char = 8,
    /// A bounded-length string.
    Varchar = 9,
    /// An arbitrary byte sequence.
    Binary = 10,
    /// A fixed-point decimal.
    Decimal = 11,
    /// Days since 1970-01-01.
    Date = 12,
    /// Seconds and nanoseconds since the epoch.
    Timestamp = 13,
    /// A variable-length list of one child type.
    List = 14,
    /// Keys and values of two child types.
    Map = 15,
    /// Named fields of child types.
    Struct = 16,
    /// One of several child types, discriminated by a tag.
    Union = 17,
}

impl Category {
    /// The schema-text keyword for this category.
    pub fn name(&self) -> &'static str {
        match self {
            Category::Boolean => "boolean",
            Category::Byte => "tinyint",
            Category::Short => "smallint",
            Category::Int => "int",
            Category::Long => "bigint",
            Category::Float => "float",
            Category::Double => "double",
            Category::String => "string",
            Category::Char => "char",
            Category::Varchar => "varchar",
            Category::Binary => "binary",
            Category::Decimal => "decimal",
            Category::Date => "date",
            Category::Timestamp => "timestamp",
            Category::List => "array",
            Category::Map => "map",
            Category::Struct => "struct",
            Category::Union => "uniontype",
        }
    }

    /// True for categories without children.
    pub fn is_primitive(&self) -> bool {
        !matches!(self, Category::List | Category::Map | Category::Struct | Category::Union)
    }

    /// Converts from the wire value stored in the footer.
    pub fn from_u8(value: u8) -> Result<Self> {
        Ok(match value {
            0 => Category::Boolean,
            1 => Category::Byte,
            2 => Category::Short,
            3 => Category::Int,
            4 => Category::Long,
            5 => Category::Float,
            6 => Category::Double,
            7 => Category::String,
            8 => Category::Char,
            9 => Category::Varchar,
            10 => Category::Binary,
            11 => Category::Decimal,
            12 => Category::Date,
            13 => Category::Timestamp,
            14 => Category::List,
            15 => Category::Map,
            16 => Category::Struct,
            17 => Category::Union,
            other => return Err(Error::corrupt(format!("unknown category {}", other))),
        })
    }
}

/// Default decimal precision when none is given.
pub const DEFAULT_PRECISION: u32 = 38;

/// Default decimal scale when none is given.
pub const DEFAULT_SCALE: u32 = 10;

/// A schema node: a category, its children and any type parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDescription {
    category: Category,
    children: Vec<TypeDescription>,
    field_names: Vec<String>,
    precision: u32,
    scale: u32,
    max_length: u32,
}

impl TypeDescription {
    /// Creates a primitive node. Decimal gets the default precision and
    /// scale; char and varchar get an unbounded length.
    pub fn new(category: Category) -> Self {
        let (precision, scale) = if category == Category::Decimal {
            (DEFAULT_PRECISION, DEFAULT_SCALE)
        } else {
            (0, 0)
        };
        Self {
            category,
            children: Vec::new(),
            field_names: Vec::new(),
            precision,
            scale,
            max_length: 0,
        }
    }

    /// Creates a decimal node with explicit precision and scale.
    pub fn decimal(precision: u32, scale: u32) -> Self {
        let mut td = Self::new(Category::Decimal);
        td.precision = precision;
        td.scale = scale;
        td
    }

    /// Creates a char node with a fixed length.
    pub fn char(max_length: u32) -> Self {
        let mut td = Self::new(Category::Char);
        td.max_length = max_length;
        td
    }

    /// Creates a varchar node with a maximum length.
    pub fn varchar(max_length: u32) -> Self {
        let mut td = Self::new(Category::Varchar);
        td.max_length = max_length;
        td
    }

    /// Creates a struct node from named fields.
    pub fn struct_of(fields: Vec<(&str, TypeDescription)>) -> Self {
        let mut td = Self::new(Category::Struct);
        for (name, child) in fields {
            td.field_names.push(name.to_string());
            td.children.push(child);
        }
        td
    }

    /// Creates a list node.
    pub fn list_of(element: TypeDescription) -> Self {
        let mut td = Self::new(Category::List);
        td.children.push(element);
        td
    }

    /// Creates a map node.
    pub fn map_of(key: TypeDescription, value: TypeDescription) -> Self {
        let mut td = Self::new(Category::Map);
        td.children.push(key);
        td.children.push(value);
        td
    }

    /// Creates a union node from its variants.
    pub fn union_of(variants: Vec<TypeDescription>) -> Self {
        let mut td = Self::new(Category::Union);
        td.children = variants;
        td
    }

    /// The node's category.
    pub fn category(&self) -> Category {
        self.category
    }

    /// The node's children, in order.
    pub fn children(&self) -> &[TypeDescription] {
        &self.children
    }

    /// Struct field names, parallel to `children`.
    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }

    /// Decimal precision.
    pub fn precision(&self) -> u32 {
        self.precision
    }

    /// Decimal scale.
    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// Char/varchar maximum length.
    pub fn max_length(&self) -> u32 {
        self.max_length
    }

    /// Parses the compact schema text form.
    pub fn from_str(text: &str) -> Result<Self> {
        let mut p = SchemaParser { input: text.as_bytes(), pos: 0 };
        let td = p.parse_type()?;
        p.skip_whitespace();
        if p.pos != p.input.len() {
            return Err(Error::schema_mismatch(format!(
                "trailing characters at offset {} in schema",
                p.pos
            )));
        }
        Ok(td)
    }

    /// Flattens the tree into the arena of pre-order id-indexed nodes.
    pub fn flatten(&self) -> FlatSchema {
        let mut nodes = Vec::new();
        self.flatten_into(&mut nodes, None);
        FlatSchema { nodes }
    }

    fn flatten_into(&self, nodes: &mut Vec<FlatNode>, parent: Option<usize>) -> usize {
        let id = nodes.len();
        nodes.push(FlatNode {
            category: self.category,
            parent,
            children: Vec::new(),
            field_names: self.field_names.clone(),
            precision: self.precision,
            scale: self.scale,
            max_length: self.max_length,
        });
        for child in &self.children {
            let child_id = child.flatten_into(nodes, Some(id));
            nodes[id].children.push(child_id);
        }
        id
    }
}

impl fmt::Display for TypeDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.category {
            Category::Decimal => write!(f, "decimal({},{})", self.precision, self.scale),
            Category::Char | Category::Varchar if self.max_length > 0 => {
                write!(f, "{}({})", self.category.name(), self.max_length)
            }
            Category::Struct => {
                write!(f, "struct<")?;
                for (i, (name, child)) in
                    self.field_names.iter().zip(&self.children).enumerate()
                {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}:{}", name, child)?;
                }
                write!(f, ">")
            }
            Category::List => write!(f, "array<{}>", self.children[0]),
            Category::Map => write!(f, "map<{},{}>", self.children[0], self.children[1]),
            Category::Union => {
                write!(f, "uniontype<")?;
                for (i, child) in self.children.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", child)?;
                }
                write!(f, ">")
            }
            _ => write!(f, "{}", self.category.name()),
        }
    }
}

/// The arena form of a schema: nodes indexed by column id, assigned
/// pre-order from the root.
#[derive(Debug, Clone)]
pub struct FlatSchema {
    nodes: Vec<FlatNode>,
}

/// One arena node. Children and parent refer to other nodes by id.
#[derive(Debug, Clone)]
pub struct FlatNode {
    /// The column's category.
    pub category: Category,
    /// The parent column id; `None` for the root.
    pub parent: Option<usize>,
    /// Child column ids, in order.
    pub children: Vec<usize>,
    /// Struct field names, parallel to `children`.
    pub field_names: Vec<String>,
    /// Decimal precision.
    pub precision: u32,
    /// Decimal scale.
    pub scale: u32,
    /// Char/varchar maximum length.
    pub max_length: u32,
}

impl FlatSchema {
    /// Builds a flat schema directly from nodes, as decoded from a footer.
    pub(crate) fn from_nodes(nodes: Vec<FlatNode>) -> Self {
        Self { nodes }
    }

    /// The number of columns.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the schema has no columns.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The node with the given column id.
    pub fn node(&self, id: usize) -> &FlatNode {
        &self.nodes[id]
    }

    /// All nodes, indexed by column id.
    pub fn nodes(&self) -> &[FlatNode] {
        &self.nodes
    }

    /// Finds a root struct field by name and returns its column id.
    pub fn field_id(&self, name: &str) -> Result<usize> {
        let root = &self.nodes[0];
        for (field, &child) in root.field_names.iter().zip(&root.children) {
            if field == name {
                return Ok(child);
            }
        }
        Err(Error::schema_mismatch(format!("no field named {:?}", name)))
    }

    /// Returns `id` plus every descendant id.
    pub fn subtree_ids(&self, id: usize) -> Vec<usize> {
        let mut ids = vec![id];
        let mut i = 0;
        while i < ids.len() {
            ids.extend(self.nodes[ids[i]].children.iter().copied());
            i += 1;
        }
        ids.sort_unstable();
        ids
    }

    /// Rebuilds the schema tree from the arena.
    pub fn to_tree(&self) -> Result<TypeDescription> {
        if self.nodes.is_empty() {
            return Err(Error::corrupt("footer contains no types"));
        }
        self.build_node(0)
    }

    fn build_node(&self, id: usize) -> Result<TypeDescription> {
        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| Error::corrupt(format!("type id {} out of range", id)))?;
        let mut td = TypeDescription::new(node.category);
        td.precision = node.precision;
        td.scale = node.scale;
        td.max_length = node.max_length;
        td.field_names = node.field_names.clone();
        for &child in &node.children {
            if child <= id {
                return Err(Error::corrupt("type children are not pre-order"));
            }
            td.children.push(self.build_node(child)?);
        }
        Ok(td)
    }
}

struct SchemaParser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> SchemaParser<'a> {
    fn skip_whitespace(&mut self) {
        while self.pos < self.input.len() && self.input[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn expect(&mut self, c: u8) -> Result<()> {
        self.skip_whitespace();
        if self.pos < self.input.len() && self.input[self.pos] == c {
            self.pos += 1;
            Ok(())
        } else {
            Err(Error::schema_mismatch(format!(
                "expected {:?} at offset {} in schema",
                c as char, self.pos
            )))
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_whitespace();
        self.input.get(self.pos).copied()
    }

    fn word(&mut self) -> String {
        self.skip_whitespace();
        let start = self.pos;
        while self.pos < self.input.len()
            && (self.input[self.pos].is_ascii_alphanumeric() || self.input[self.pos] == b'_')
        {
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.input[start..self.pos]).to_string()
    }

    fn number(&mut self) -> Result<u32> {
        let w = self.word();
        w.parse::<u32>()
            .map_err(|_| Error::schema_mismatch(format!("expected a number, got {:?}", w)))
    }

    fn parse_type(&mut self) -> Result<TypeDescription> {
        let keyword = self.word().to_ascii_lowercase();
        match keyword.as_str() {
            "boolean" => Ok(TypeDescription::new(Category::Boolean)),
            "tinyint" => Ok(TypeDescription::new(Category::Byte)),
            "smallint" => Ok(TypeDescription::new(Category::Short)),
            "int" => Ok(TypeDescription::new(Category::Int)),
            "bigint" => Ok(TypeDescription::new(Category::Long)),
            "float" => Ok(TypeDescription::new(Category::Float)),
            "double" => Ok(TypeDescription::new(Category::Double)),
            "string" => Ok(TypeDescription::new(Category::String)),
            "binary" => Ok(TypeDescription::new(Category::Binary)),
            "date" => Ok(TypeDescription::new(Category::Date)),
            "timestamp" => Ok(TypeDescription::new(Category::Timestamp)),
            "decimal" => {
                if self.peek() == Some(b'(') {
                    self.expect(b'(')?;
                    let precision = self.number()?;
                    self.expect(b',')?;
                    let scale = self.number()?;
                    self.expect(b')')?;
                    Ok(TypeDescription::decimal(precision, scale))
                } else {
                    Ok(TypeDescription::new(Category::Decimal))
                }
            }
            "char" | "varchar" => {
                let mut max_length = 0;
                if self.peek() == Some(b'(') {
                    self.expect(b'(')?;
                    max_length = self.number()?;
                    self.expect(b')')?;
                }
                if keyword == "char" {
                    Ok(TypeDescription::char(max_length))
                } else {
                    Ok(TypeDescription::varchar(max_length))
                }
            }
            "array" => {
                self.expect(b'<')?;
                let element = self.parse_type()?;
                self.expect(b'>')?;
                Ok(TypeDescription::list_of(element))
            }
            "map" => {
                self.expect(b'<')?;
                let key = self.parse_type()?;
                self.expect(b',')?;
                let value = self.parse_type()?;
                self.expect(b'>')?;
                Ok(TypeDescription::map_of(key, value))
            }
            "struct" => {
                self.expect(b'<')?;
                let mut td = TypeDescription::new(Category::Struct);
                loop {
                    let name = self.word();
                    if name.is_empty() {
                        return Err(Error::schema_mismatch(format!(
                            "expected a field name at offset {}",
                            self.pos
                        )));
                    }
                    self.expect(b':')?;
                    let child = self.parse_type()?;
                    td.field_names.push(name);
                    td.children.push(child);
                    match self.peek() {
                        Some(b',') => self.expect(b',')?,
                        _ => break,
                    }
                }
                self.expect(b'>')?;
                Ok(td)
            }
            "uniontype" => {
                self.expect(b'<')?;
                let mut variants = Vec::new();
                loop {
                    variants.push(self.parse_type()?);
                    match self.peek() {
                        Some(b',') => self.expect(b',')?,
                        _ => break,
                    }
                }
                self.expect(b'>')?;
                Ok(TypeDescription::union_of(variants))
            }
            other => Err(Error::schema_mismatch(format!("unknown type {:?}", other))),
        }
    }
}
