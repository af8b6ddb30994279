use indexmap::IndexMap;

use super::{Material, MaterialCategory, RoomType};

const UNSPLASH_SWATCH: &str = "ixlib=rb-4.0.3&q=85&fm=jpg&crop=entropy&cs=srgb&w=200";

pub fn category_structure(category: MaterialCategory) -> &'static [&'static str] {
    match category {
        MaterialCategory::Marble => &[
            "Italian Marble",
            "Indian Marble",
            "Onyx Series",
            "Statuario Collection",
        ],
        MaterialCategory::Granite => &[
            "Italian Granite",
            "Indian Granite",
            "Black Galaxy",
            "Premium Collection",
        ],
        MaterialCategory::Tiles => &[
            "Floor Tiles",
            "Parking Tiles",
            "Bathroom Tiles",
            "Wooden Finish Tiles",
        ],
    }
}

/// Built-in swatches offered for `room`, in display order.
pub fn default_materials(room: RoomType) -> Vec<Material> {
    default_rooms().swap_remove(&room).unwrap_or_default()
}

fn default_rooms() -> IndexMap<RoomType, Vec<Material>> {
    use MaterialCategory::{Granite, Marble, Tiles};

    let mut map: IndexMap<RoomType, Vec<Material>> = IndexMap::new();
    let mut insert = |room: RoomType,
                      id: &str,
                      name: &str,
                      prompt: &str,
                      photo: &str,
                      category: MaterialCategory,
                      sub_category: &str| {
        let image_url = if photo.contains('?') {
            format!("https://images.unsplash.com/{photo}")
        } else {
            format!("https://images.unsplash.com/{photo}?{UNSPLASH_SWATCH}")
        };
        map.entry(room).or_default().push(Material {
            id: id.to_string(),
            name: name.to_string(),
            prompt: prompt.to_string(),
            image_url,
            category: Some(category),
            sub_category: Some(sub_category.to_string()),
            price: None,
            height: None,
            width: None,
            saved_designs: Vec::new(),
        });
    };

    let room = RoomType::LivingRoom;
    insert(room, "lr-im", "Italian Marble", "classic italian marble flooring", "photo-1543887893-242e23297592", Marble, "Italian Marble");
    insert(room, "lr-wmgv", "White Marble Gold Vein", "white marble flooring with subtle gold veins", "photo-1619478445452-2a0339-d2c6f3", Marble, "Statuario Collection");
    insert(room, "lr-btt", "Beige Travertine Tile", "beige travertine tile flooring", "photo-1582736342622-c352de43b8c3", Tiles, "Floor Tiles");
    insert(room, "lr-gm", "Grey Marble", "elegant grey marble tile flooring", "photo-1621264479391-3f80c6c72852", Marble, "Indian Marble");
    insert(room, "lr-bgg", "Black Galaxy Granite", "Black Galaxy granite flooring with golden flecks", "photo-1593524931393-2795e13511de", Granite, "Black Galaxy");
    insert(room, "lr-mct", "Modern Ceramic Tile", "large format modern ceramic tile flooring", "photo-1580974928064-03ae727c6295", Tiles, "Floor Tiles");
    insert(room, "lr-lowt", "Light Oak Wood Tile", "light oak wooden finish tile flooring", "photo-1588854336873-5a1e1b1d9294", Tiles, "Wooden Finish Tiles");

    let room = RoomType::Bedroom;
    insert(room, "br-cmt", "Cream Marble Tile", "polished cream marble tile flooring", "photo-1629806413695-97e3a951d3b5", Marble, "Italian Marble");
    insert(room, "br-kwg", "Kashmir White Granite", "Kashmir white granite flooring", "photo-1617063493504-8e7a78354674", Granite, "Indian Granite");
    insert(room, "br-ppt", "Patterned Porcelain Tile", "elegant patterned porcelain tile flooring", "photo-1603952937237-97cf03e85844", Tiles, "Floor Tiles");
    insert(room, "br-btt", "Beige Travertine Tile", "beige travertine tile flooring", "photo-1582736342622-c352de43b8c3", Tiles, "Floor Tiles");
    insert(room, "br-dowt", "Dark Oak Wood Tile", "dark oak wooden finish tile flooring", "photo-1594411993248-1855363a35a4", Tiles, "Wooden Finish Tiles");

    let room = RoomType::Kitchen;
    insert(room, "kt-ct", "Checkered Tile", "classic black and white checkered tile flooring", "photo-1605372351241-3729514e4143", Tiles, "Floor Tiles");
    insert(room, "kt-tt", "Terracotta Tile", "warm terracotta tile flooring", "photo-1627909337795-c12e7546554b", Tiles, "Floor Tiles");
    insert(room, "kt-ug", "Ubatuba Granite", "dark Ubatuba granite flooring", "photo-1628795186867-151121d4c2b2", Granite, "Premium Collection");
    insert(room, "kt-cm", "Carrara Marble", "white Carrara marble flooring", "photo-1617103996236-ec2a5f782335", Marble, "Italian Marble");
    insert(room, "kt-dst", "Dark Slate Tile", "dark slate stone tile flooring", "photo-1549995424-279c1cb0b428", Tiles, "Floor Tiles");

    let room = RoomType::Bathroom;
    insert(room, "bt-cwt", "Classic White Tile", "classic glossy white ceramic tile flooring", "photo-1629806413695-97e3a951d3b5", Tiles, "Bathroom Tiles");
    insert(room, "bt-pct", "Patterned Ceramic Tile", "blue and white patterned ceramic tile flooring", "photo-1603952937237-97cf03e85844", Tiles, "Bathroom Tiles");
    insert(room, "bt-gm", "Grey Marble", "elegant grey marble tile flooring", "photo-1621264479391-3f80c6c72852", Marble, "Indian Marble");
    insert(room, "bt-dst", "Dark Slate Tile", "dark slate stone tile flooring", "photo-1549995424-279c1cb0b428", Tiles, "Bathroom Tiles");
    insert(room, "bt-bpg", "Blue Pearl Granite", "blue pearl granite flooring", "photo-1561083313-25531dc17c1e", Granite, "Premium Collection");
    insert(room, "bt-pom", "Pink Onyx Marble", "polished pink onyx marble flooring", "photo-1631745481350-a36c84381389", Marble, "Onyx Series");

    let room = RoomType::Office;
    insert(room, "of-gm", "Grey Marble", "elegant grey marble tile flooring", "photo-1621264479391-3f80c6c72852", Marble, "Indian Marble");
    insert(room, "of-ppt", "Polished Porcelain Tile", "large format polished porcelain tile flooring", "photo-1588280592036-81d74a7b7381", Tiles, "Floor Tiles");
    insert(room, "of-tbg", "Tan Brown Granite", "tan brown granite flooring", "photo-1598993883398-7517a59c95c8", Granite, "Indian Granite");
    insert(room, "of-mbt", "Matte Black Tile", "large matte black tile flooring", "photo-1605372351241-3729514e4143", Tiles, "Floor Tiles");
    insert(room, "of-cp", "Cobblestone Pavers", "durable cobblestone paver flooring", "photo-1587580193424-d75a8923a1e1", Tiles, "Parking Tiles");

    let room = RoomType::GuestRoom;
    insert(room, "gr-btt", "Beige Travertine Tile", "beige travertine tile flooring", "photo-1582736342622-c352de43b8c3", Tiles, "Floor Tiles");
    insert(room, "gr-cwt", "Classic White Tile", "classic glossy white ceramic tile flooring", "photo-1629806413695-97e3a951d3b5", Tiles, "Bathroom Tiles");
    insert(room, "gr-em", "Emperador Marble", "dark Emperador marble flooring", "photo-1567016432779-1fee8416787d?q=85&fm=jpg&crop=entropy&cs=srgb&w=200", Marble, "Indian Marble");
    insert(room, "gr-abg", "Absolute Black Granite", "polished absolute black granite flooring", "photo-1574786577759-aebe0992718b?q=85&fm=jpg&crop=entropy&cs=srgb&w=200", Granite, "Black Galaxy");
    insert(room, "gr-bag", "Bianco Antico Granite", "bianco antico white and grey granite flooring", "photo-1580214686888-a2267685da2c?q=85&fm=jpg&crop=entropy&cs=srgb&w=200", Granite, "Italian Granite");

    map
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn every_room_has_seeded_materials() {
        for room in RoomType::ALL {
            assert!(!default_materials(room).is_empty(), "no defaults for {room}");
        }
        assert_eq!(default_materials(RoomType::LivingRoom).len(), 7);
        assert_eq!(default_materials(RoomType::Bathroom).len(), 6);
    }

    #[test]
    fn seeded_sub_categories_belong_to_their_category() {
        for room in RoomType::ALL {
            for material in default_materials(room) {
                let category = material.category.unwrap_or(MaterialCategory::Tiles);
                let sub = material.sub_category.as_deref().unwrap_or("");
                assert!(
                    category_structure(category).contains(&sub),
                    "{} has sub-category {sub} outside {category}",
                    material.id
                );
            }
        }
    }

    #[test]
    fn seeded_ids_are_unique_per_room_and_not_user_ids() {
        for room in RoomType::ALL {
            let materials = default_materials(room);
            let ids: HashSet<&str> = materials.iter().map(|material| material.id.as_str()).collect();
            assert_eq!(ids.len(), materials.len());
            assert!(materials.iter().all(|material| !material.is_user_material()));
        }
    }

    #[test]
    fn image_urls_keep_explicit_query_strings() {
        let url_of = |room: RoomType, id: &str| {
            default_materials(room)
                .into_iter()
                .find(|material| material.id == id)
                .map(|material| material.image_url)
                .unwrap_or_default()
        };
        assert_eq!(
            url_of(RoomType::GuestRoom, "gr-em"),
            "https://images.unsplash.com/photo-1567016432779-1fee8416787d?q=85&fm=jpg&crop=entropy&cs=srgb&w=200"
        );
        assert!(url_of(RoomType::LivingRoom, "lr-im").ends_with(UNSPLASH_SWATCH));
    }
}
