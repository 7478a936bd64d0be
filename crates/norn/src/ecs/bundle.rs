//! # Bundle — Named Groups of Components
//!
//! A bundle is a grouping convenience: a value that can be exploded into the
//! individual components it is made of. Spawning with a bundle expands to
//! "allocate entity, insert each component individually"; the bundle itself
//! has no identity and is not stored anywhere after expansion.
//!
//! Tuples of components are bundles out of the box:
//!
//! ```ignore
//! world.spawn_bundle((Position { x: 0.0, y: 0.0 }, Velocity { dx: 1.0, dy: 0.0 }));
//! ```
//!
//! Custom bundles implement [`Bundle`] directly, typically by delegating to
//! a tuple:
//!
//! ```ignore
//! struct PlayerBundle { position: Position, health: Health }
//!
//! impl Bundle for PlayerBundle {
//!     fn components(self) -> Vec<BoxedComponent> {
//!         (self.position, self.health).components()
//!     }
//! }
//! ```

use super::component::BoxedComponent;

/// A group of components inserted together.
///
/// Implemented for tuples up to 8 elements. Each element must be
/// `'static + Send + Sync`.
pub trait Bundle {
    /// Explode into type-erased components, in declaration order.
    fn components(self) -> Vec<BoxedComponent>;
}

/// A single component is a one-element bundle.
impl<T: 'static + Send + Sync> Bundle for (T,) {
    fn components(self) -> Vec<BoxedComponent> {
        vec![BoxedComponent::new(self.0)]
    }
}

macro_rules! impl_bundle_tuple {
    ($($T:ident),+) => {
        impl<$($T: 'static + Send + Sync),+> Bundle for ($($T,)+) {
            #[allow(non_snake_case)]
            fn components(self) -> Vec<BoxedComponent> {
                let ($($T,)+) = self;
                vec![$(BoxedComponent::new($T)),+]
            }
        }
    };
}

impl_bundle_tuple!(A, B);
impl_bundle_tuple!(A, B, C);
impl_bundle_tuple!(A, B, C, D);
impl_bundle_tuple!(A, B, C, D, E);
impl_bundle_tuple!(A, B, C, D, E, F);
impl_bundle_tuple!(A, B, C, D, E, F, G);
impl_bundle_tuple!(A, B, C, D, E, F, G, H);

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::TypeId;

    struct Position {
        x: f32,
    }
    struct Health(u32);

    #[test]
    fn tuple_expands_in_order() {
        let parts = (Position { x: 1.0 }, Health(5)).components();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].type_id(), TypeId::of::<Position>());
        assert_eq!(parts[1].type_id(), TypeId::of::<Health>());
    }

    #[test]
    fn custom_bundle_delegates() {
        struct PlayerBundle {
            position: Position,
            health: Health,
        }
        impl Bundle for PlayerBundle {
            fn components(self) -> Vec<BoxedComponent> {
                (self.position, self.health).components()
            }
        }

        let parts = PlayerBundle {
            position: Position { x: 0.0 },
            health: Health(10),
        }
        .components();
        assert_eq!(parts.len(), 2);
    }
}
