// SPDX-License-Identifier: GPL-3.0-only

//! In-memory media graph: entities, pads and links
//!
//! The graph is an arena. Entities own their pads by index, pads point back
//! at their entity through an [`EntityId`] and list the links touching them.
//! Entities and pads are immutable once discovered; only the per-link
//! enabled flag changes, and only through the topology configurator, which
//! mirrors every successful hardware link setup into the graph.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PadId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId(usize);

/// Data flow direction of a pad
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadDirection {
    /// Receives data from an upstream entity
    Sink,
    /// Emits data to a downstream entity
    Source,
}

/// Named hardware processing stage
#[derive(Debug, Clone)]
pub struct Entity {
    id: EntityId,
    name: String,
    pads: Vec<PadId>,
}

impl Entity {
    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pads(&self) -> &[PadId] {
        &self.pads
    }
}

/// Port on an entity
#[derive(Debug, Clone)]
pub struct Pad {
    id: PadId,
    index: u32,
    entity: EntityId,
    direction: PadDirection,
    links: Vec<LinkId>,
}

impl Pad {
    pub fn id(&self) -> PadId {
        self.id
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn direction(&self) -> PadDirection {
        self.direction
    }

    pub fn links(&self) -> &[LinkId] {
        &self.links
    }
}

/// Directed source → sink connection between two pads
#[derive(Debug, Clone)]
pub struct Link {
    id: LinkId,
    source: PadId,
    sink: PadId,
    enabled: bool,
}

impl Link {
    pub fn id(&self) -> LinkId {
        self.id
    }

    pub fn source(&self) -> PadId {
        self.source
    }

    pub fn sink(&self) -> PadId {
        self.sink
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// Name-based endpoint of a link, as handed to the hardware layer
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PadRef {
    pub entity: String,
    pub pad: u32,
}

impl fmt::Display for PadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}':{}", self.entity, self.pad)
    }
}

/// Name-based description of a link
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinkDesc {
    pub source: PadRef,
    pub sink: PadRef,
}

impl fmt::Display for LinkDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.sink)
    }
}

/// Topology of one media device
#[derive(Debug, Clone, Default)]
pub struct MediaGraph {
    driver: String,
    entities: Vec<Entity>,
    pads: Vec<Pad>,
    links: Vec<Link>,
}

impl MediaGraph {
    pub fn new(driver: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            ..Default::default()
        }
    }

    /// Driver name reported by the media device (e.g. "rkisp1")
    pub fn driver(&self) -> &str {
        &self.driver
    }

    /// Add an entity whose pads are numbered in the order given
    pub fn add_entity(&mut self, name: impl Into<String>, pads: &[PadDirection]) -> EntityId {
        let entity_id = EntityId(self.entities.len());
        let mut pad_ids = Vec::with_capacity(pads.len());
        for (index, direction) in pads.iter().enumerate() {
            let pad_id = PadId(self.pads.len());
            self.pads.push(Pad {
                id: pad_id,
                index: index as u32,
                entity: entity_id,
                direction: *direction,
                links: Vec::new(),
            });
            pad_ids.push(pad_id);
        }
        self.entities.push(Entity {
            id: entity_id,
            name: name.into(),
            pads: pad_ids,
        });
        entity_id
    }

    /// Connect a source pad to a sink pad
    ///
    /// Returns `None` when either pad does not exist or the directions do
    /// not line up.
    pub fn add_link(
        &mut self,
        source: EntityId,
        source_pad: u32,
        sink: EntityId,
        sink_pad: u32,
        enabled: bool,
    ) -> Option<LinkId> {
        let source = self.pad_by_index(source, source_pad)?;
        let sink = self.pad_by_index(sink, sink_pad)?;
        if source.direction != PadDirection::Source || sink.direction != PadDirection::Sink {
            return None;
        }
        let (source, sink) = (source.id, sink.id);

        let id = LinkId(self.links.len());
        self.links.push(Link {
            id,
            source,
            sink,
            enabled,
        });
        self.pads[source.0].links.push(id);
        self.pads[sink.0].links.push(id);
        Some(id)
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn entity(&self, id: EntityId) -> &Entity {
        &self.entities[id.0]
    }

    pub fn pad(&self, id: PadId) -> &Pad {
        &self.pads[id.0]
    }

    pub fn link(&self, id: LinkId) -> &Link {
        &self.links[id.0]
    }

    pub fn entity_by_name(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name == name)
    }

    pub fn pad_by_index(&self, entity: EntityId, index: u32) -> Option<&Pad> {
        self.entities
            .get(entity.0)?
            .pads
            .iter()
            .map(|id| &self.pads[id.0])
            .find(|pad| pad.index == index)
    }

    /// Entity owning a pad
    pub fn pad_entity(&self, pad: PadId) -> &Entity {
        self.entity(self.pad(pad).entity)
    }

    /// Look up the link between two named pads
    pub fn find_link(
        &self,
        source: &str,
        source_pad: u32,
        sink: &str,
        sink_pad: u32,
    ) -> Option<LinkId> {
        let source = self.pad_by_index(self.entity_by_name(source)?.id, source_pad)?;
        let sink_id = self.pad_by_index(self.entity_by_name(sink)?.id, sink_pad)?.id;
        source
            .links
            .iter()
            .copied()
            .find(|id| self.links[id.0].sink == sink_id)
    }

    /// Entity at the source end of a link
    pub fn link_source_entity(&self, link: LinkId) -> &Entity {
        self.pad_entity(self.link(link).source)
    }

    /// Name-based description of a link for hardware calls and logging
    pub fn describe_link(&self, link: LinkId) -> LinkDesc {
        let link = self.link(link);
        let source = self.pad(link.source);
        let sink = self.pad(link.sink);
        LinkDesc {
            source: PadRef {
                entity: self.entity(source.entity).name.clone(),
                pad: source.index,
            },
            sink: PadRef {
                entity: self.entity(sink.entity).name.clone(),
                pad: sink.index,
            },
        }
    }

    /// Links into a pad that are currently enabled
    pub fn enabled_links_into(&self, pad: PadId) -> Vec<LinkId> {
        self.pad(pad)
            .links
            .iter()
            .copied()
            .filter(|id| {
                let link = &self.links[id.0];
                link.sink == pad && link.enabled
            })
            .collect()
    }

    /// Record the enabled state after the hardware accepted a link change
    pub(crate) fn set_link_flag(&mut self, link: LinkId, enabled: bool) {
        self.links[link.0].enabled = enabled;
    }
}
