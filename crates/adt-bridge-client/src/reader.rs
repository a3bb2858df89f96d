// crates/adt-bridge-client/src/reader.rs
// ============================================================================
// Module: Repository Readers
// Description: Typed read operations per object kind plus search and checks.
// Purpose: Expose the repository read surface over the transport.
// Dependencies: adt-bridge-core, regex, serde
// ============================================================================

//! ## Overview
//! One read operation per object kind, all funneled through the same
//! transport. Every operation consults the safety policy before it builds
//! a request. Structured reads set their kind-specific media type; source
//! reads accept plain text.

// ============================================================================
// SECTION: Imports
// ============================================================================

use adt_bridge_core::ObjectIdentity;
use adt_bridge_core::ObjectKind;
use adt_bridge_core::OperationClass;
use adt_bridge_core::addressing::class_include_uri;
use adt_bridge_core::normalize_object_name;
use adt_bridge_core::object_source_uri;
use adt_bridge_core::object_uri;
use regex::RegexBuilder;
use serde::Deserialize;
use serde::Serialize;

use crate::client::AdtClient;
use crate::error::AdtError;
use crate::transport::RequestOptions;
use crate::xml::XmlElement;
use crate::xml::parse_tolerant;

// ============================================================================
// SECTION: Media Types
// ============================================================================

/// Accept header for class object structure reads.
const OBJECTSTRUCTURE_MEDIA_TYPE: &str = "application/vnd.sap.adt.objectstructure.v2+xml";

/// Accept header for message class reads.
const MESSAGE_CLASS_MEDIA_TYPE: &str = "application/vnd.sap.adt.mc.messageclass+xml";

/// Default maximum number of search results.
const DEFAULT_SEARCH_RESULTS: u32 = 100;

/// Default maximum number of data preview rows.
const DEFAULT_QUERY_ROWS: u32 = 100;

// ============================================================================
// SECTION: Result Types
// ============================================================================

/// One object reference returned by quick search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Repository URI of the object.
    pub uri: String,
    /// Object name.
    pub name: String,
    /// Repository type code (for example `PROG/P`).
    #[serde(rename = "type")]
    pub object_type: String,
    /// Containing package, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    /// Short description, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Function group metadata with its contained modules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionGroupInfo {
    /// Function group name.
    pub name: String,
    /// Short description.
    pub description: Option<String>,
    /// Contained function module names.
    pub function_modules: Vec<String>,
}

/// Service binding metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceBinding {
    /// Binding name.
    pub name: String,
    /// Repository type code.
    #[serde(rename = "type")]
    pub object_type: String,
    /// Short description.
    pub description: String,
    /// True when the binding is published.
    pub published: bool,
    /// Binding protocol (for example `ODATA`).
    pub binding_type: String,
    /// Protocol version (for example `V2`).
    pub binding_version: String,
    /// Name of the bound service definition.
    pub service_definition: Option<String>,
}

/// One record of a message class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Three-digit message number.
    pub number: String,
    /// Message text.
    pub text: String,
}

/// A message class with its records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageClass {
    /// Message class name.
    pub name: String,
    /// Short description.
    pub description: String,
    /// Message records in document order.
    pub messages: Vec<MessageRecord>,
}

/// One object inside a package listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageObject {
    /// Repository type code.
    #[serde(rename = "type")]
    pub object_type: String,
    /// Object name.
    pub name: String,
    /// Repository URI, when reported.
    pub uri: String,
    /// Short description.
    pub description: String,
}

/// Contents of a development package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageContent {
    /// Package name.
    pub name: String,
    /// Contained objects (excluding sub-packages).
    pub objects: Vec<PackageObject>,
    /// Contained sub-package names.
    pub sub_packages: Vec<String>,
}

/// One method of a class with its implementation line range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodInfo {
    /// Method name.
    pub name: String,
    /// First line of the implementation (1-based, 0 when absent).
    pub implementation_start: u32,
    /// Last line of the implementation (inclusive, 0 when absent).
    pub implementation_end: u32,
}

/// Declared structure of a class: includes and methods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassStructure {
    /// Declared include tags.
    pub includes: Vec<String>,
    /// Methods with implementation line ranges.
    pub methods: Vec<MethodInfo>,
}

/// Resolved navigation target of a definition lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefinitionTarget {
    /// Target URI, possibly with a fragment position.
    pub uri: String,
    /// Target object name, when reported.
    pub name: Option<String>,
}

/// One usage reference of a source position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceEntry {
    /// Referencing object URI.
    pub uri: String,
    /// Referencing object name.
    pub name: String,
    /// Repository type code, when reported.
    pub object_type: Option<String>,
}

/// One alert raised by a unit test method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestAlert {
    /// Alert kind (for example `failedAssertion`).
    pub kind: String,
    /// Alert severity (for example `critical`).
    pub severity: String,
    /// Alert title.
    pub title: String,
}

/// One executed unit test method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestMethod {
    /// Method name.
    pub name: String,
    /// Execution time in seconds, when reported.
    pub execution_time: Option<f64>,
    /// Alerts raised by this method.
    pub alerts: Vec<TestAlert>,
}

/// One executed unit test class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestClass {
    /// Test class name.
    pub name: String,
    /// Executed test methods.
    pub methods: Vec<TestMethod>,
}

/// Result of a unit test run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitTestResult {
    /// Executed test classes.
    pub classes: Vec<TestClass>,
}

impl UnitTestResult {
    /// Returns true when no method raised an alert.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.classes
            .iter()
            .all(|class| class.methods.iter().all(|method| method.alerts.is_empty()))
    }
}

/// One message reported by a syntax check run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckMessage {
    /// Checked object URI.
    pub uri: String,
    /// Message type (`E`, `W`, `I`).
    pub message_type: String,
    /// Message text.
    pub text: String,
    /// Source line, when reported.
    pub line: Option<u32>,
}

/// Result table of a data preview query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column names in result order.
    pub columns: Vec<String>,
    /// Row values in column order.
    pub rows: Vec<Vec<String>>,
    /// Total row count reported by the server, when present.
    pub total_rows: Option<u64>,
}

/// One grep match inside an object source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrepMatch {
    /// Object name the match was found in.
    pub object: String,
    /// Include tag for class sources, when relevant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<String>,
    /// Matching line number (1-based).
    pub line: u32,
    /// Matching line content.
    pub content: String,
}

// ============================================================================
// SECTION: Search
// ============================================================================

impl AdtClient {
    /// Searches repository objects by name pattern.
    ///
    /// Wildcards `*` and `?` pass through unchanged. A non-positive
    /// `max_results` falls back to the default of 100.
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] for policy denials, transport failures, and
    /// malformed payloads.
    pub async fn search_object(
        &self,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<SearchResult>, AdtError> {
        self.check(OperationClass::Read, query)?;
        let max_results = if max_results == 0 { DEFAULT_SEARCH_RESULTS } else { max_results };
        let options = RequestOptions::get()
            .with_query("operation", "quickSearch")
            .with_query("query", query)
            .with_query("maxResults", &max_results.to_string())
            .with_accept("application/xml");
        let response = self
            .transport()
            .request("/sap/bc/adt/repository/informationsystem/search", options)
            .await?;
        let tree = parse_tolerant(&response.body)?;
        Ok(decode_object_references(&tree))
    }

    // ========================================================================
    // SECTION: Source Reads
    // ========================================================================

    /// Reads the plain-text source of any source-bearing object.
    ///
    /// Class identities may carry an include tag to address a sub-include.
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] for policy denials and transport failures.
    pub async fn get_source(&self, identity: &ObjectIdentity) -> Result<String, AdtError> {
        self.check(OperationClass::Read, &identity.name)?;
        let path = source_path(identity);
        let options = RequestOptions::get().with_accept("text/plain");
        let response = self.transport().request(&path, options).await?;
        Ok(response.text())
    }

    /// Reads an ABAP program source.
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] for policy denials and transport failures.
    pub async fn get_program(&self, name: &str) -> Result<String, AdtError> {
        self.get_source(&ObjectIdentity::new(ObjectKind::Program, name)).await
    }

    /// Reads the unified main source of a class.
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] for policy denials and transport failures.
    pub async fn get_class_source(&self, name: &str) -> Result<String, AdtError> {
        self.get_source(&ObjectIdentity::new(ObjectKind::Class, name)).await
    }

    /// Reads an interface source.
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] for policy denials and transport failures.
    pub async fn get_interface(&self, name: &str) -> Result<String, AdtError> {
        self.get_source(&ObjectIdentity::new(ObjectKind::Interface, name)).await
    }

    /// Reads a program include source.
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] for policy denials and transport failures.
    pub async fn get_include(&self, name: &str) -> Result<String, AdtError> {
        self.get_source(&ObjectIdentity::new(ObjectKind::Include, name)).await
    }

    /// Reads a function module source from its group.
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] for policy denials and transport failures.
    pub async fn get_function(&self, group: &str, name: &str) -> Result<String, AdtError> {
        self.get_source(
            &ObjectIdentity::new(ObjectKind::FunctionModule, name).with_parent(group),
        )
        .await
    }

    /// Reads a CDS data definition source.
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] for policy denials and transport failures.
    pub async fn get_data_definition(&self, name: &str) -> Result<String, AdtError> {
        self.get_source(&ObjectIdentity::new(ObjectKind::DataDefinition, name)).await
    }

    /// Reads a behavior definition source.
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] for policy denials and transport failures.
    pub async fn get_behavior_definition(&self, name: &str) -> Result<String, AdtError> {
        self.get_source(&ObjectIdentity::new(ObjectKind::BehaviorDefinition, name)).await
    }

    /// Reads a service definition source.
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] for policy denials and transport failures.
    pub async fn get_service_definition(&self, name: &str) -> Result<String, AdtError> {
        self.get_source(&ObjectIdentity::new(ObjectKind::ServiceDefinition, name)).await
    }

    /// Reads a table definition source.
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] for policy denials and transport failures.
    pub async fn get_table(&self, name: &str) -> Result<String, AdtError> {
        self.get_source(&ObjectIdentity::new(ObjectKind::Table, name)).await
    }

    /// Reads a classic DDIC view source.
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] for policy denials and transport failures.
    pub async fn get_view(&self, name: &str) -> Result<String, AdtError> {
        self.get_source(&ObjectIdentity::new(ObjectKind::View, name)).await
    }

    /// Reads a DDIC structure source.
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] for policy denials and transport failures.
    pub async fn get_structure(&self, name: &str) -> Result<String, AdtError> {
        self.get_source(&ObjectIdentity::new(ObjectKind::Structure, name)).await
    }

    // ========================================================================
    // SECTION: Structured Reads
    // ========================================================================

    /// Reads function group metadata with its contained modules.
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] for policy denials, transport failures, and
    /// malformed payloads.
    pub async fn get_function_group(&self, name: &str) -> Result<FunctionGroupInfo, AdtError> {
        self.check(OperationClass::Read, name)?;
        let path = object_uri(ObjectKind::FunctionGroup, name, None);
        let options = RequestOptions::get().with_accept("application/xml");
        let response = self.transport().request(&path, options).await?;
        let tree = parse_tolerant(&response.body)?;
        let function_modules = tree
            .find_all("functionModule")
            .iter()
            .filter_map(|module| module.attr("name").map(str::to_string))
            .collect();
        Ok(FunctionGroupInfo {
            name: normalize_object_name(name),
            description: tree.attr("description").map(str::to_string),
            function_modules,
        })
    }

    /// Reads service binding metadata.
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] for policy denials, transport failures, and
    /// malformed payloads.
    pub async fn get_service_binding(&self, name: &str) -> Result<ServiceBinding, AdtError> {
        self.check(OperationClass::Read, name)?;
        let path = object_uri(ObjectKind::ServiceBinding, name, None);
        let options = RequestOptions::get().with_accept("*/*");
        let response = self.transport().request(&path, options).await?;
        let tree = parse_tolerant(&response.body)?;
        let binding = tree.find_first("binding");
        let service_definition = tree
            .find_first("serviceDefinition")
            .and_then(|definition| definition.attr("name"))
            .map(str::to_string);
        Ok(ServiceBinding {
            name: tree
                .attr("name")
                .map(str::to_string)
                .unwrap_or_else(|| normalize_object_name(name)),
            object_type: tree.attr("type").unwrap_or_default().to_string(),
            description: tree.attr("description").unwrap_or_default().to_string(),
            published: tree.attr("published") == Some("true"),
            binding_type: binding.and_then(|b| b.attr("type")).unwrap_or_default().to_string(),
            binding_version: binding
                .and_then(|b| b.attr("version"))
                .unwrap_or_default()
                .to_string(),
            service_definition,
        })
    }

    /// Reads a message class with all of its records.
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] for policy denials, transport failures, and
    /// malformed payloads.
    pub async fn get_message_class(&self, name: &str) -> Result<MessageClass, AdtError> {
        let response = self.get_message_class_document(name).await?;
        let tree = parse_tolerant(&response)?;
        let messages = tree
            .find_all("messages")
            .iter()
            .filter_map(|record| {
                record.attr("msgno").map(|number| MessageRecord {
                    number: number.to_string(),
                    text: record.attr("msgtext").unwrap_or_default().to_string(),
                })
            })
            .collect();
        Ok(MessageClass {
            name: normalize_object_name(name),
            description: tree.attr("description").unwrap_or_default().to_string(),
            messages,
        })
    }

    /// Reads the raw message-class document for surgical editing.
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] for policy denials and transport failures.
    pub async fn get_message_class_document(&self, name: &str) -> Result<Vec<u8>, AdtError> {
        self.check(OperationClass::Read, name)?;
        let path = object_uri(ObjectKind::MessageClass, name, None);
        let options = RequestOptions::get().with_accept(MESSAGE_CLASS_MEDIA_TYPE);
        let response = self.transport().request(&path, options).await?;
        Ok(response.body)
    }

    /// Reads the contents of a development package.
    ///
    /// An empty response body is a valid empty package.
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] for policy denials, transport failures, and
    /// malformed payloads.
    pub async fn get_package(&self, name: &str) -> Result<PackageContent, AdtError> {
        self.check(OperationClass::Read, name)?;
        let normalized = normalize_object_name(name);
        let options = RequestOptions::post()
            .with_query("parent_type", "DEVC/K")
            .with_query("parent_name", &normalized)
            .with_query("withShortDescriptions", "true");
        let response = self
            .transport()
            .request("/sap/bc/adt/repository/nodestructure", options)
            .await?;
        if response.body.is_empty() {
            return Ok(PackageContent {
                name: normalized,
                objects: Vec::new(),
                sub_packages: Vec::new(),
            });
        }
        let tree = parse_tolerant(&response.body)?;
        Ok(decode_package_nodes(&tree, normalized))
    }

    /// Reads the declared structure of a class.
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] for policy denials, transport failures, and
    /// malformed payloads.
    pub async fn get_class_structure(&self, name: &str) -> Result<ClassStructure, AdtError> {
        self.check(OperationClass::Read, name)?;
        let path = format!("{}/objectstructure", object_uri(ObjectKind::Class, name, None));
        let options = RequestOptions::get().with_accept(OBJECTSTRUCTURE_MEDIA_TYPE);
        let response = self.transport().request(&path, options).await?;
        let tree = parse_tolerant(&response.body)?;
        let mut includes = Vec::new();
        let mut methods = Vec::new();
        for element in tree.find_all("objectStructureElement") {
            match element.attr("type") {
                Some("CLAS/OM") => {
                    if let Some(method_name) = element.attr("name") {
                        methods.push(MethodInfo {
                            name: method_name.to_string(),
                            implementation_start: element.attr_u32("implementationStart").unwrap_or(0),
                            implementation_end: element.attr_u32("implementationEnd").unwrap_or(0),
                        });
                    }
                }
                Some("CLAS/I") => {
                    if let Some(include) = element.attr("includeType") {
                        includes.push(include.to_string());
                    }
                }
                _ => {}
            }
        }
        Ok(ClassStructure {
            includes,
            methods,
        })
    }

    /// Extracts one method's implementation from the class main source.
    ///
    /// Line numbers are 1-based and the range is inclusive.
    ///
    /// # Errors
    ///
    /// Returns [`AdtError::MissingEntity`] when the method is absent or has
    /// no implementation, and [`AdtError::LineRangeOutOfBounds`] when the
    /// recorded range exceeds the fetched source.
    pub async fn get_class_method_source(
        &self,
        class: &str,
        method: &str,
    ) -> Result<String, AdtError> {
        let method = normalize_object_name(method);
        let structure = self.get_class_structure(class).await?;
        let Some(info) = structure.methods.iter().find(|entry| entry.name == method) else {
            return Err(AdtError::MissingEntity {
                entity: format!("method {method}"),
                container: normalize_object_name(class),
            });
        };
        if info.implementation_start == 0 || info.implementation_end == 0 {
            return Err(AdtError::MissingEntity {
                entity: format!("implementation of method {method}"),
                container: normalize_object_name(class),
            });
        }
        let source = self.get_class_source(class).await?;
        let lines: Vec<&str> = source.lines().collect();
        let line_count = u32::try_from(lines.len()).unwrap_or(u32::MAX);
        if info.implementation_end > line_count {
            return Err(AdtError::LineRangeOutOfBounds {
                start: info.implementation_start,
                end: info.implementation_end,
                lines: line_count,
            });
        }
        let start = (info.implementation_start - 1) as usize;
        let end = info.implementation_end as usize;
        Ok(lines[start..end].join("\n"))
    }

    // ========================================================================
    // SECTION: Navigation
    // ========================================================================

    /// Resolves the definition behind a source position.
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] for policy denials, transport failures, and
    /// malformed payloads.
    pub async fn find_definition(
        &self,
        source_uri: &str,
        line: u32,
        column: u32,
    ) -> Result<Option<DefinitionTarget>, AdtError> {
        self.check(OperationClass::Read, source_uri)?;
        let position = format!("{source_uri}#start={line},{column}");
        let options = RequestOptions::get()
            .with_query("uri", &position)
            .with_accept("application/xml");
        let response = self.transport().request("/sap/bc/adt/navigation/target", options).await?;
        if response.body.is_empty() {
            return Ok(None);
        }
        let tree = parse_tolerant(&response.body)?;
        let reference = if tree.name == "objectReference" {
            Some(&tree)
        } else {
            tree.find_first("objectReference")
        };
        Ok(reference.map(|element| DefinitionTarget {
            uri: element.attr("uri").unwrap_or_default().to_string(),
            name: element.attr("name").map(str::to_string),
        }))
    }

    /// Lists usage references of a source position.
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] for policy denials, transport failures, and
    /// malformed payloads.
    pub async fn find_references(
        &self,
        source_uri: &str,
        line: u32,
        column: u32,
    ) -> Result<Vec<ReferenceEntry>, AdtError> {
        self.check(OperationClass::Read, source_uri)?;
        let position = format!("{source_uri}#start={line},{column}");
        let body = concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
            "<usagereferences:usageReferenceRequest ",
            "xmlns:usagereferences=\"http://www.sap.com/adt/ris/usageReferences\"/>",
        );
        let options = RequestOptions::post()
            .with_query("uri", &position)
            .with_accept("application/xml")
            .with_body("application/xml", body.as_bytes().to_vec());
        let response = self
            .transport()
            .request("/sap/bc/adt/repository/informationsystem/usageReferences", options)
            .await?;
        let tree = parse_tolerant(&response.body)?;
        Ok(tree
            .find_all("referencedObject")
            .iter()
            .filter_map(|element| {
                element.attr("uri").map(|uri| ReferenceEntry {
                    uri: uri.to_string(),
                    name: element
                        .attr("name")
                        .or_else(|| element.attr("objectIdentifier"))
                        .unwrap_or_default()
                        .to_string(),
                    object_type: element.attr("type").map(str::to_string),
                })
            })
            .collect())
    }

    // ========================================================================
    // SECTION: Checks and Queries
    // ========================================================================

    /// Triggers the unit tests of an object and decodes the result.
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] for policy denials, transport failures, and
    /// malformed payloads.
    pub async fn run_unit_tests(&self, object_uri: &str) -> Result<UnitTestResult, AdtError> {
        self.check(OperationClass::Execute, object_uri)?;
        let body = format!(
            concat!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
                "<aunit:runConfiguration xmlns:aunit=\"http://www.sap.com/adt/aunit\">\n",
                "<external><coverage active=\"false\"/></external>\n",
                "<adtcore:objectSets xmlns:adtcore=\"http://www.sap.com/adt/core\">\n",
                "<objectSet kind=\"inclusive\">\n",
                "<adtcore:objectReferences>\n",
                "<adtcore:objectReference adtcore:uri=\"{uri}\"/>\n",
                "</adtcore:objectReferences>\n",
                "</objectSet>\n",
                "</adtcore:objectSets>\n",
                "</aunit:runConfiguration>",
            ),
            uri = object_uri
        );
        let options = RequestOptions::post()
            .with_accept("application/xml")
            .with_body("application/vnd.sap.adt.abapunit.testruns.config.v4+xml", body.into_bytes());
        let response = self.transport().request("/sap/bc/adt/abapunit/testruns", options).await?;
        let tree = parse_tolerant(&response.body)?;
        Ok(decode_unit_test_result(&tree))
    }

    /// Runs a syntax check for an object, optionally over unsaved source.
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] for policy denials, transport failures, and
    /// malformed payloads.
    pub async fn syntax_check(
        &self,
        object_uri: &str,
        source: Option<&str>,
    ) -> Result<Vec<CheckMessage>, AdtError> {
        self.check(OperationClass::Read, object_uri)?;
        let artifact = source.map_or_else(String::new, |content| {
            format!(
                "<chkrun:artifacts><chkrun:artifact chkrun:contentType=\"text/plain; charset=utf-8\" chkrun:uri=\"{object_uri}\"><chkrun:content>{}</chkrun:content></chkrun:artifact></chkrun:artifacts>",
                crate::xml::escape_attribute(content)
            )
        });
        let body = format!(
            concat!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
                "<chkrun:checkObjectList xmlns:chkrun=\"http://www.sap.com/adt/checkrun\" ",
                "xmlns:adtcore=\"http://www.sap.com/adt/core\">\n",
                "<chkrun:checkObject adtcore:uri=\"{uri}\" chkrun:version=\"active\">{artifact}</chkrun:checkObject>\n",
                "</chkrun:checkObjectList>",
            ),
            uri = object_uri,
            artifact = artifact
        );
        let options = RequestOptions::post()
            .with_query("reporters", "abapCheckRun")
            .with_accept("application/xml")
            .with_body("application/vnd.sap.adt.checkobjects+xml", body.into_bytes());
        let response = self.transport().request("/sap/bc/adt/checkruns", options).await?;
        let tree = parse_tolerant(&response.body)?;
        Ok(tree
            .find_all("checkMessage")
            .iter()
            .map(|message| CheckMessage {
                uri: message.attr("uri").unwrap_or_default().to_string(),
                message_type: message.attr("type").unwrap_or_default().to_string(),
                text: message.attr("shortText").unwrap_or(&message.text).to_string(),
                line: message.attr_u32("line"),
            })
            .collect())
    }

    /// Runs a data preview query and decodes the result table.
    ///
    /// A bare identifier expands to `SELECT * FROM <identifier>`.
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] for policy denials, transport failures, and
    /// malformed payloads.
    pub async fn query_data(&self, query: &str, max_rows: u32) -> Result<QueryResult, AdtError> {
        self.check(OperationClass::Execute, query)?;
        let max_rows = if max_rows == 0 { DEFAULT_QUERY_ROWS } else { max_rows };
        let statement = expand_bare_identifier(query);
        let options = RequestOptions::post()
            .with_query("rowNumber", &max_rows.to_string())
            .with_accept("application/xml")
            .with_body("text/plain", statement.into_bytes());
        let response = self
            .transport()
            .request("/sap/bc/adt/datapreview/freestyle", options)
            .await?;
        let tree = parse_tolerant(&response.body)?;
        Ok(decode_query_result(&tree))
    }

    // ========================================================================
    // SECTION: Grep
    // ========================================================================

    /// Greps one object's source for a pattern (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] for invalid patterns, policy denials, and
    /// transport failures.
    pub async fn grep_object(
        &self,
        identity: &ObjectIdentity,
        pattern: &str,
    ) -> Result<Vec<GrepMatch>, AdtError> {
        let regex = build_grep_regex(pattern)?;
        let source = self.get_source(identity).await?;
        Ok(grep_source(
            &identity.name,
            identity.include.map(|include| include.as_str().to_string()),
            &source,
            &regex,
        ))
    }

    /// Greps every source-bearing object of a package for a pattern.
    ///
    /// Objects whose source cannot be fetched are skipped so one broken
    /// object does not abort the sweep.
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] for invalid patterns, policy denials, and
    /// failures of the package listing itself.
    pub async fn grep_package(
        &self,
        package: &str,
        pattern: &str,
    ) -> Result<Vec<GrepMatch>, AdtError> {
        let regex = build_grep_regex(pattern)?;
        let content = self.get_package(package).await?;
        let mut matches = Vec::new();
        for object in &content.objects {
            let Some(kind) = ObjectKind::from_repository_type(&object.object_type) else {
                continue;
            };
            if !kind.has_source() {
                continue;
            }
            let identity = ObjectIdentity::new(kind, &object.name);
            if let Ok(source) = self.get_source(&identity).await {
                matches.extend(grep_source(&identity.name, None, &source, &regex));
            }
        }
        Ok(matches)
    }
}

// ============================================================================
// SECTION: Decode Helpers
// ============================================================================

/// Decodes `objectReference` entries from a search response.
fn decode_object_references(tree: &XmlElement) -> Vec<SearchResult> {
    tree.find_all("objectReference")
        .iter()
        .filter_map(|reference| {
            let name = reference.attr("name")?;
            Some(SearchResult {
                uri: reference.attr("uri").unwrap_or_default().to_string(),
                name: name.to_string(),
                object_type: reference.attr("type").unwrap_or_default().to_string(),
                package: reference.attr("packageName").map(str::to_string),
                description: reference.attr("description").map(str::to_string),
            })
        })
        .collect()
}

/// Decodes nodestructure rows into a package content listing.
fn decode_package_nodes(tree: &XmlElement, name: String) -> PackageContent {
    let mut content = PackageContent {
        name,
        objects: Vec::new(),
        sub_packages: Vec::new(),
    };
    for node in tree.find_all("SEU_ADT_REPOSITORY_OBJ_NODE") {
        let object_type = node
            .find_first("OBJECT_TYPE")
            .map(|element| element.text.clone())
            .unwrap_or_default();
        let object_name = node
            .find_first("OBJECT_NAME")
            .map(|element| element.text.clone())
            .unwrap_or_default();
        if object_name.is_empty() {
            continue;
        }
        if object_type == "DEVC/K" {
            content.sub_packages.push(object_name);
        } else {
            content.objects.push(PackageObject {
                object_type,
                name: object_name,
                uri: node
                    .find_first("OBJECT_URI")
                    .map(|element| element.text.clone())
                    .unwrap_or_default(),
                description: node
                    .find_first("DESCRIPTION")
                    .map(|element| element.text.clone())
                    .unwrap_or_default(),
            });
        }
    }
    content
}

/// Decodes a unit test run response.
fn decode_unit_test_result(tree: &XmlElement) -> UnitTestResult {
    let classes = tree
        .find_all("testClass")
        .iter()
        .map(|class| TestClass {
            name: class.attr("name").unwrap_or_default().to_string(),
            methods: class
                .find_all("testMethod")
                .iter()
                .map(|method| TestMethod {
                    name: method.attr("name").unwrap_or_default().to_string(),
                    execution_time: method
                        .attr("executionTime")
                        .and_then(|value| value.parse().ok()),
                    alerts: method
                        .find_all("alert")
                        .iter()
                        .map(|alert| TestAlert {
                            kind: alert.attr("kind").unwrap_or_default().to_string(),
                            severity: alert.attr("severity").unwrap_or_default().to_string(),
                            title: alert
                                .find_first("title")
                                .map(|title| title.text.clone())
                                .unwrap_or_default(),
                        })
                        .collect(),
                })
                .collect(),
        })
        .collect();
    UnitTestResult {
        classes,
    }
}

/// Decodes a data preview response (column-major on the wire).
fn decode_query_result(tree: &XmlElement) -> QueryResult {
    let total_rows = tree
        .find_first("totalRows")
        .and_then(|element| element.text.trim().parse().ok());
    let mut columns = Vec::new();
    let mut column_values: Vec<Vec<String>> = Vec::new();
    for column in tree.find_all("columns") {
        let Some(metadata) = column.find_first("metadata") else {
            continue;
        };
        columns.push(metadata.attr("name").unwrap_or_default().to_string());
        let values = column
            .find_all("data")
            .iter()
            .map(|data| data.text.clone())
            .collect();
        column_values.push(values);
    }
    let row_count = column_values.iter().map(Vec::len).max().unwrap_or(0);
    let mut rows = Vec::with_capacity(row_count);
    for row_index in 0..row_count {
        let row = column_values
            .iter()
            .map(|values| values.get(row_index).cloned().unwrap_or_default())
            .collect();
        rows.push(row);
    }
    QueryResult {
        columns,
        rows,
        total_rows,
    }
}

/// Returns the source path for an identity, honoring class includes.
fn source_path(identity: &ObjectIdentity) -> String {
    match (identity.kind, identity.include) {
        (ObjectKind::Class, Some(include)) => class_include_uri(&identity.name, include),
        _ => object_source_uri(identity.kind, &identity.name, identity.parent.as_deref()),
    }
}

/// Expands a bare identifier into a select statement.
fn expand_bare_identifier(query: &str) -> String {
    let trimmed = query.trim();
    let is_identifier = !trimmed.is_empty()
        && trimmed
            .chars()
            .next()
            .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && trimmed.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
    if is_identifier {
        format!("SELECT * FROM {trimmed}")
    } else {
        trimmed.to_string()
    }
}

/// Compiles a case-insensitive grep pattern.
fn build_grep_regex(pattern: &str) -> Result<regex::Regex, AdtError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|err| AdtError::InvalidArgument(format!("invalid pattern: {err}")))
}

/// Collects matching lines of one source.
fn grep_source(
    object: &str,
    include: Option<String>,
    source: &str,
    regex: &regex::Regex,
) -> Vec<GrepMatch> {
    source
        .lines()
        .enumerate()
        .filter(|(_, line)| regex.is_match(line))
        .map(|(index, line)| GrepMatch {
            object: object.to_string(),
            include: include.clone(),
            line: u32::try_from(index + 1).unwrap_or(u32::MAX),
            content: line.to_string(),
        })
        .collect()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions favor direct unwrap/expect for clarity."
    )]

    use super::*;

    /// Tests decoding of search object references.
    #[test]
    fn decode_search_results() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?>
<adtcore:objectReferences xmlns:adtcore="http://www.sap.com/adt/core">
  <adtcore:objectReference adtcore:uri="/sap/bc/adt/programs/programs/ztest" adtcore:type="PROG/P" adtcore:name="ZTEST" adtcore:packageName="$TMP"/>
</adtcore:objectReferences>"#;
        let tree = parse_tolerant(xml).expect("parse");
        let results = decode_object_references(&tree);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "ZTEST");
        assert_eq!(results[0].object_type, "PROG/P");
        assert_eq!(results[0].package.as_deref(), Some("$TMP"));
    }

    /// Tests decoding of package nodestructure rows.
    #[test]
    fn decode_package_listing() {
        let xml = br"<asx:abap xmlns:asx='http://www.sap.com/abapxml'><asx:values><DATA><TREE_CONTENT>
<SEU_ADT_REPOSITORY_OBJ_NODE><OBJECT_TYPE>CLAS/OC</OBJECT_TYPE><OBJECT_NAME>ZCL_A</OBJECT_NAME><OBJECT_URI>/sap/bc/adt/oo/classes/zcl_a</OBJECT_URI><DESCRIPTION>A class</DESCRIPTION></SEU_ADT_REPOSITORY_OBJ_NODE>
<SEU_ADT_REPOSITORY_OBJ_NODE><OBJECT_TYPE>DEVC/K</OBJECT_TYPE><OBJECT_NAME>ZSUB</OBJECT_NAME></SEU_ADT_REPOSITORY_OBJ_NODE>
<SEU_ADT_REPOSITORY_OBJ_NODE><OBJECT_TYPE>PROG/P</OBJECT_TYPE><OBJECT_NAME></OBJECT_NAME></SEU_ADT_REPOSITORY_OBJ_NODE>
</TREE_CONTENT></DATA></asx:values></asx:abap>";
        let tree = parse_tolerant(xml).expect("parse");
        let content = decode_package_nodes(&tree, "ZPKG".to_string());
        assert_eq!(content.objects.len(), 1);
        assert_eq!(content.objects[0].name, "ZCL_A");
        assert_eq!(content.sub_packages, vec!["ZSUB".to_string()]);
    }

    /// Tests decoding of unit test results with alerts.
    #[test]
    fn decode_unit_tests_with_alerts() {
        let xml = br#"<aunit:runResult xmlns:aunit="http://www.sap.com/adt/aunit">
<program><testClasses><testClass name="LTCL_DEMO">
<testMethods><testMethod name="CHECK_SUM" executionTime="0.01">
<alerts><alert kind="failedAssertion" severity="critical"><title>Sum mismatch</title></alert></alerts>
</testMethod><testMethod name="CHECK_EMPTY" executionTime="0.00"/></testMethods>
</testClass></testClasses></program></aunit:runResult>"#;
        let tree = parse_tolerant(xml).expect("parse");
        let result = decode_unit_test_result(&tree);
        assert_eq!(result.classes.len(), 1);
        assert_eq!(result.classes[0].methods.len(), 2);
        assert!(!result.passed());
        assert_eq!(result.classes[0].methods[0].alerts[0].title, "Sum mismatch");
    }

    /// Tests decoding of column-major data preview payloads.
    #[test]
    fn decode_data_preview_transposes_columns() {
        let xml = br#"<dataPreview:tableData xmlns:dataPreview="http://www.sap.com/adt/dataPreview">
<dataPreview:totalRows>2</dataPreview:totalRows>
<dataPreview:columns><dataPreview:metadata dataPreview:name="CARRID"/><dataPreview:dataSet><dataPreview:data>AA</dataPreview:data><dataPreview:data>LH</dataPreview:data></dataPreview:dataSet></dataPreview:columns>
<dataPreview:columns><dataPreview:metadata dataPreview:name="CONNID"/><dataPreview:dataSet><dataPreview:data>0017</dataPreview:data><dataPreview:data>0400</dataPreview:data></dataPreview:dataSet></dataPreview:columns>
</dataPreview:tableData>"#;
        let tree = parse_tolerant(xml).expect("parse");
        let result = decode_query_result(&tree);
        assert_eq!(result.columns, vec!["CARRID".to_string(), "CONNID".to_string()]);
        assert_eq!(result.rows, vec![
            vec!["AA".to_string(), "0017".to_string()],
            vec!["LH".to_string(), "0400".to_string()],
        ]);
        assert_eq!(result.total_rows, Some(2));
    }

    /// Tests bare identifier expansion for data preview queries.
    #[test]
    fn bare_identifiers_expand_to_select() {
        assert_eq!(expand_bare_identifier("sflight"), "SELECT * FROM sflight");
        assert_eq!(expand_bare_identifier("T000"), "SELECT * FROM T000");
        assert_eq!(
            expand_bare_identifier("SELECT carrid FROM sflight"),
            "SELECT carrid FROM sflight"
        );
        assert_eq!(expand_bare_identifier("123abc"), "123abc");
    }

    /// Tests grep line collection with 1-based line numbers.
    #[test]
    fn grep_reports_one_based_lines() {
        let regex = build_grep_regex("write").expect("regex");
        let matches = grep_source("ZTEST", None, "REPORT ztest.\nWRITE 'x'.\n", &regex);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].line, 2);
        assert_eq!(matches[0].content, "WRITE 'x'.");
    }

    /// Tests that invalid grep patterns are rejected as arguments.
    #[test]
    fn invalid_grep_pattern_is_invalid_argument() {
        let err = build_grep_regex("[").unwrap_err();
        assert!(matches!(err, AdtError::InvalidArgument(_)));
    }
}
