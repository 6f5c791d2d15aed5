use crate::command::{Direction, Rotation};

/// Dead-reckoning position, accumulated from acknowledged move commands.
///
/// `y` points to where the drone faced at take off, `rot` is in radians,
/// counter-clockwise positive.
#[derive(Default, Debug, PartialEq, Clone)]
pub struct Odometry {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub rot: f64,
}

impl Odometry {
    fn translate(&mut self, x: f64, y: f64) {
        self.x += x * self.rot.cos() - y * self.rot.sin();
        self.y += x * self.rot.sin() + y * self.rot.cos();
    }

    pub fn reset(&mut self) {
        *self = Odometry::default();
    }

    pub fn apply_move(&mut self, direction: Direction, cm: u32) {
        let cm = f64::from(cm);
        match direction {
            Direction::Up => self.z += cm,
            Direction::Down => self.z = (self.z - cm).max(0.0),
            Direction::Right => self.translate(cm, 0.0),
            Direction::Left => self.translate(-cm, 0.0),
            Direction::Forward => self.translate(0.0, cm),
            Direction::Back => self.translate(0.0, -cm),
        }
    }

    pub fn apply_rotation(&mut self, rotation: Rotation, degrees: u32) {
        let rad = f64::from(degrees).to_radians();
        match rotation {
            Rotation::Clockwise => self.rot -= rad,
            Rotation::CounterClockwise => self.rot += rad,
        }
    }

    pub fn land(&mut self) {
        self.z = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn back_to_start() {
        let mut p = Odometry::default();
        p.apply_move(Direction::Forward, 100);
        p.apply_rotation(Rotation::Clockwise, 45);
        p.apply_move(Direction::Forward, 100);
        p.apply_rotation(Rotation::Clockwise, 180);
        p.apply_move(Direction::Forward, 100);
        p.apply_rotation(Rotation::CounterClockwise, 45);
        p.apply_move(Direction::Forward, 100);
        assert_eq!(p.x.round(), 0.0);
        assert_eq!(p.y.round(), 0.0);
    }

    #[test]
    fn square() {
        let mut p = Odometry::default();
        p.apply_move(Direction::Forward, 100);
        assert_eq!((p.x, p.y), (0.0, 100.0));
        p.apply_rotation(Rotation::Clockwise, 90);
        p.apply_move(Direction::Forward, 100);
        assert_eq!((p.x.round(), p.y.round()), (100.0, 100.0));
        p.apply_rotation(Rotation::Clockwise, 90);
        p.apply_move(Direction::Forward, 200);
        assert_eq!((p.x.round(), p.y.round()), (100.0, -100.0));
        p.apply_move(Direction::Left, 200);
        assert_eq!((p.x.round(), p.y.round()), (300.0, -100.0));
    }

    #[test]
    fn height_never_goes_negative() {
        let mut p = Odometry::default();
        p.apply_move(Direction::Up, 50);
        p.apply_move(Direction::Down, 80);
        assert_eq!(p.z, 0.0);
        p.apply_move(Direction::Up, 30);
        p.land();
        assert_eq!(p.z, 0.0);
    }
}
