use crate::sprite::{LayerID, Sprite};

/// An unordered set of layers. Order is recovered from the sprite when needed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelectedLayers {
    set: hashbrown::HashSet<LayerID>,
}
impl SelectedLayers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.set.len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }
    pub fn clear(&mut self) {
        self.set.clear();
    }
    pub fn insert(&mut self, layer: LayerID) {
        self.set.insert(layer);
    }
    pub fn erase(&mut self, layer: LayerID) {
        self.set.remove(&layer);
    }
    #[must_use]
    pub fn contains(&self, layer: LayerID) -> bool {
        self.set.contains(&layer)
    }
    /// In no particular order.
    pub fn iter(&self) -> impl Iterator<Item = LayerID> + '_ {
        self.set.iter().copied()
    }
    /// Do all selected layers share one parent?
    #[must_use]
    pub fn has_same_parent(&self, sprite: &Sprite) -> bool {
        let mut parents = self
            .set
            .iter()
            .map(|layer| sprite.layer(*layer).map(crate::sprite::Layer::parent));
        match parents.next() {
            Some(first) => parents.all(|parent| parent == first),
            None => true,
        }
    }
    /// Selected layers in the order of [`Sprite::all_layers`].
    #[must_use]
    pub fn to_all_layers_list(&self, sprite: &Sprite) -> Vec<LayerID> {
        sprite
            .all_layers()
            .into_iter()
            .filter(|layer| self.contains(*layer))
            .collect()
    }
    /// Selected layers in the order of [`Sprite::all_browsable_layers`].
    #[must_use]
    pub fn to_browsable_layer_list(&self, sprite: &Sprite) -> Vec<LayerID> {
        sprite
            .all_browsable_layers()
            .into_iter()
            .filter(|layer| self.contains(*layer))
            .collect()
    }
    /// Are the selected layers consecutive siblings? Only meaningful if they share a parent.
    #[must_use]
    pub fn are_layers_adjacent(&self, sprite: &Sprite) -> bool {
        self.to_all_layers_list(sprite)
            .windows(2)
            .all(|pair| sprite.previous_sibling(pair[1]) == Some(pair[0]))
    }
    /// Pull the descendants of every selected collapsed group into the selection.
    pub fn expand_collapsed_groups(&mut self, sprite: &Sprite) {
        let collapsed: Vec<LayerID> = self
            .set
            .iter()
            .copied()
            .filter(|id| {
                sprite
                    .layer(*id)
                    .is_some_and(|layer| layer.is_group() && !layer.is_expanded())
            })
            .collect();
        for group in collapsed {
            if let Some(subtree) = sprite.subtree(group) {
                self.set
                    .extend(subtree.layers().iter().map(crate::sprite::Layer::id));
            }
        }
    }
    /// Shift every layer `delta` steps through the browsable order.
    ///
    /// If any layer would fall off either end, the whole shift is retried with a delta one step
    /// closer to zero. Reaching zero leaves the selection unchanged.
    pub fn displace(&mut self, sprite: &Sprite, delta: i32) {
        if delta == 0 {
            return;
        }
        let original = std::mem::take(&mut self.set);
        let mut delta = delta;
        'retry: while delta != 0 {
            self.set.clear();
            for &layer in &original {
                let mut cursor = Some(layer);
                for _ in 0..delta.unsigned_abs() {
                    let Some(current) = cursor else { break };
                    cursor = if delta > 0 {
                        sprite.next_browsable(current)
                    } else {
                        sprite.previous_browsable(current)
                    };
                }
                if let Some(moved) = cursor {
                    self.set.insert(moved);
                } else {
                    delta -= delta.signum();
                    continue 'retry;
                }
            }
            return;
        }
        self.set = original;
    }
}
impl FromIterator<LayerID> for SelectedLayers {
    fn from_iter<T: IntoIterator<Item = LayerID>>(iter: T) -> Self {
        Self {
            set: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sprite::Layer;

    #[test]
    fn adjacency_and_parents() {
        let mut sprite = Sprite::new(1, 1);
        let a = sprite.add_layer(None, Layer::image("a")).unwrap();
        let b = sprite.add_layer(None, Layer::image("b")).unwrap();
        let c = sprite.add_layer(None, Layer::image("c")).unwrap();
        let group = sprite.add_layer(None, Layer::group("g")).unwrap();
        let inner = sprite.add_layer(Some(group), Layer::image("inner")).unwrap();

        let ab: SelectedLayers = [b, a].into_iter().collect();
        assert!(ab.has_same_parent(&sprite));
        assert!(ab.are_layers_adjacent(&sprite));
        assert_eq!(ab.to_all_layers_list(&sprite), vec![a, b]);

        let ac: SelectedLayers = [a, c].into_iter().collect();
        assert!(!ac.are_layers_adjacent(&sprite));

        let mixed: SelectedLayers = [a, inner].into_iter().collect();
        assert!(!mixed.has_same_parent(&sprite));
    }
    #[test]
    fn displace_retries_smaller() {
        let mut sprite = Sprite::new(1, 1);
        let a = sprite.add_layer(None, Layer::image("a")).unwrap();
        let b = sprite.add_layer(None, Layer::image("b")).unwrap();
        let c = sprite.add_layer(None, Layer::image("c")).unwrap();

        let mut selection: SelectedLayers = [a].into_iter().collect();
        // Only two steps are available above `a`.
        selection.displace(&sprite, 5);
        assert_eq!(selection.to_all_layers_list(&sprite), vec![c]);
        selection.displace(&sprite, -1);
        assert_eq!(selection.to_all_layers_list(&sprite), vec![b]);

        let mut top: SelectedLayers = [c].into_iter().collect();
        top.displace(&sprite, 1);
        assert_eq!(top.to_all_layers_list(&sprite), vec![c]);
    }
    #[test]
    fn expand_collapsed() {
        let mut sprite = Sprite::new(1, 1);
        let group = sprite.add_layer(None, Layer::group("g")).unwrap();
        let inner = sprite.add_layer(Some(group), Layer::image("inner")).unwrap();
        sprite.layer_mut(group).unwrap().flags |= crate::sprite::LayerFlags::COLLAPSED;

        let mut selection: SelectedLayers = [group].into_iter().collect();
        selection.expand_collapsed_groups(&sprite);
        assert!(selection.contains(inner));
        assert_eq!(selection.len(), 2);
    }
}
